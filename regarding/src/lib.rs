//! Declarative given/when/then test cases
//!
//! A test case is declared as a sequence of phases: preconditions (`given`),
//! at most one action under test (`when`) and observations (`then`). Running
//! it executes the phases in that order and always runs the cleanups paired
//! with successful preconditions, in reverse order.
//!
//! ```no_run
//! use regarding::regarding;
//!
//! let report = regarding("string formatting", |suite| {
//!     suite.test_that("prefixes the input", |scenario, _| {
//!         scenario.given([("foo", "bar")])?;
//!         scenario.when(|vars| Ok(format!("when-{}", vars.get_str("foo").unwrap_or_default())))?;
//!         scenario.then(|outcome, _| {
//!             anyhow::ensure!(outcome.and_then(|o| o.value()) == Some(&"when-bar".into()));
//!             Ok(())
//!         })?;
//!         Ok(())
//!     });
//!     Ok(())
//! })
//! .run_blocking();
//!
//! assert!(report.passed);
//! ```

pub mod case;
pub mod config;
pub mod error;
pub mod failure;
pub mod given;
pub mod outcome;
pub mod scenario;
pub mod sequence;
pub mod suite;
pub mod variables;

pub use case::{test, Phase, TestCase, TestResult};
pub use config::RunConfig;
pub use error::{DeclarationError, StepError};
pub use failure::Failure;
pub use given::{StepRecord, StepStatus};
pub use outcome::Outcome;
pub use scenario::{GivenHandle, Observations, Scenario, StaticGiven};
pub use suite::{regarding, Suite, SuiteResult};
pub use variables::TestVariables;
