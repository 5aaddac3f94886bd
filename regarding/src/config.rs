//! Run configuration

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings controlling how test cases run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Turn panics inside steps into captured failures
    #[serde(default = "default_true")]
    pub catch_panics: bool,

    /// Fail an otherwise-passing test when one of its cleanups fails
    #[serde(default)]
    pub fail_on_cleanup_error: bool,

    /// Stop a suite after the first failing test case
    #[serde(default)]
    pub stop_on_first_failure: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            catch_panics: default_true(),
            fail_on_cleanup_error: false,
            stop_on_first_failure: false,
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse run configuration")
    }

    /// Load configuration from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize run configuration")
    }
}

fn default_true() -> bool {
    true
}
