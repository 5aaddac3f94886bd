//! Test case engine
//!
//! A test case runs its declared steps in a fixed order:
//!
//! 1. givens, in declaration order, each merging its variables into the
//!    mapping accumulated so far; the first failing given stops setup
//! 2. the action under test, if any, normalized into an [`Outcome`]
//! 3. observations, in declaration order; the first failing one stops the rest
//! 4. cleanups of the givens that set up successfully, in reverse order
//!
//! Cleanup always runs. Failures never escape [`TestCase::run`]; they are
//! captured into the returned [`TestResult`].

use std::fmt;
use std::future::Future;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tracing::{debug, info, info_span, Instrument};

use crate::config::RunConfig;
use crate::failure::{capture, capture_async, Failure};
use crate::given::{setup_records, tear_down, Cleanup, Setup, StepRecord};
use crate::outcome::Outcome;
use crate::scenario::{Blueprint, Observation, Scenario};
use crate::sequence::{self, Step};
use crate::variables::TestVariables;

/// The phase of a test case in which its failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Declaration,
    Setup,
    Observation,
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Declaration => "declaration",
            Phase::Setup => "setup",
            Phase::Observation => "observation",
            Phase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Terminal result of running one test case
#[derive(Debug, Clone)]
pub struct TestResult {
    pub description: String,

    pub passed: bool,

    /// The failure that decided the result
    pub error: Option<Failure>,

    /// Where `error` happened
    pub phase: Option<Phase>,

    /// One record per given, in declaration order
    pub setup: Vec<StepRecord>,

    /// One record per given, in the order cleanups ran (reverse declaration order)
    pub cleanup: Vec<StepRecord>,
}

impl TestResult {
    fn declaration_failed(description: String, error: Failure) -> Self {
        Self {
            description,
            passed: false,
            error: Some(error),
            phase: Some(Phase::Declaration),
            setup: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    /// Failures of cleanups, in the order the cleanups ran
    pub fn cleanup_errors(&self) -> Vec<&Failure> {
        self.cleanup.iter().filter_map(StepRecord::error).collect()
    }

    pub fn into_result(self) -> anyhow::Result<()> {
        match self.error {
            None => Ok(()),
            Some(error) => {
                let phase = self
                    .phase
                    .map(|phase| phase.to_string())
                    .unwrap_or_else(|| "run".to_string());
                Err(anyhow::Error::new(error)
                    .context(format!("Test '{}' failed during {}", self.description, phase)))
            }
        }
    }
}

enum Declaration {
    Pending(LocalBoxFuture<'static, Result<(), Failure>>),
    Settled(Result<(), Failure>),
}

/// One declared test case
pub struct TestCase {
    description: String,
    scenario: Scenario,
    declaration: Declaration,
    config: RunConfig,
}

impl TestCase {
    /// Declare a test case; `define` runs immediately to register the steps
    pub fn declare<S, F>(description: impl Into<String>, subject: &S, define: F) -> Self
    where
        S: ?Sized,
        F: FnOnce(&Scenario, &S) -> anyhow::Result<()>,
    {
        let description = description.into();
        let scenario = Scenario::new(description.clone());
        let settled = capture(true, || define(&scenario, subject));
        scenario.seal();

        Self {
            description,
            scenario,
            declaration: Declaration::Settled(settled),
            config: RunConfig::default(),
        }
    }

    /// Declare a test case whose declaration callback suspends
    ///
    /// The callback settles on [`TestCase::defined`] or, at the latest, when
    /// the case runs.
    pub fn declare_async<S, F, Fut>(description: impl Into<String>, subject: S, define: F) -> Self
    where
        F: FnOnce(Scenario, S) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let description = description.into();
        let scenario = Scenario::new(description.clone());

        let declaration = match capture(true, || Ok(define(scenario.clone(), subject))) {
            Ok(pending) => Declaration::Pending(capture_async(true, pending).boxed_local()),
            Err(error) => {
                scenario.seal();
                Declaration::Settled(Err(error))
            }
        };

        Self {
            description,
            scenario,
            declaration,
            config: RunConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Wait for the declaration callback to settle
    pub async fn defined(&mut self) -> Result<(), Failure> {
        let settled = match &mut self.declaration {
            Declaration::Settled(settled) => return settled.clone(),
            Declaration::Pending(pending) => pending.await,
        };

        self.scenario.seal();
        self.declaration = Declaration::Settled(settled.clone());
        settled
    }

    /// Run the test case; never fails, every failure is part of the result
    pub async fn run(mut self) -> TestResult {
        let span = info_span!("test_case", description = %self.description);

        async move {
            if let Err(error) = self.defined().await {
                info!(error = %error, "test case declaration failed");
                return TestResult::declaration_failed(self.description, error);
            }

            let result = execute(self.scenario.take_blueprint(), &self.config).await;
            info!(passed = result.passed, "test case finished");
            result
        }
        .instrument(span)
        .await
    }
}

async fn execute(blueprint: Blueprint, config: &RunConfig) -> TestResult {
    let Blueprint {
        description,
        givens,
        when,
        thens,
        ..
    } = blueprint;
    let catch_panics = config.catch_panics;

    let given_count = givens.len();
    let (setups, cleanups): (Vec<Setup>, Vec<Option<Cleanup>>) = givens
        .into_iter()
        .map(|given| (given.setup, given.taken))
        .unzip();

    let steps = setups
        .into_iter()
        .enumerate()
        .map(|(index, setup)| -> Step<'static, TestVariables, Failure> {
            Box::new(move |variables: TestVariables| {
                async move {
                    debug!(index, "running given");
                    let partial = setup.produce(variables.clone(), catch_panics).await?;
                    Ok::<_, Failure>(variables.merged(partial))
                }
                .boxed_local()
            })
        });
    let chained = sequence::chain(steps, TestVariables::new()).await;

    let setup = setup_records(given_count, chained.completed, chained.error.as_ref());
    let completed = chained.completed;
    let variables = chained.value;

    let primary = match chained.error {
        Some(error) => {
            debug!(error = %error, "setup failed, skipping action and observations");
            Some((Phase::Setup, error))
        }
        None => {
            let outcome = match when {
                Some(action) => {
                    debug!("running action");
                    Some(action.perform(variables.clone(), catch_panics).await)
                }
                None => None,
            };

            observe(thens, outcome, &variables, catch_panics)
                .await
                .err()
                .map(|error| (Phase::Observation, error))
        }
    };

    let cleanup = tear_down(cleanups, completed, &variables, catch_panics).await;

    let (phase, error) = match primary {
        Some((phase, error)) => (Some(phase), Some(error)),
        None => match cleanup.iter().find_map(StepRecord::error) {
            Some(error) if config.fail_on_cleanup_error => {
                (Some(Phase::Cleanup), Some(error.clone()))
            }
            _ => (None, None),
        },
    };

    TestResult {
        description,
        passed: error.is_none(),
        error,
        phase,
        setup,
        cleanup,
    }
}

async fn observe(
    thens: Vec<Observation>,
    outcome: Option<Outcome>,
    variables: &TestVariables,
    catch_panics: bool,
) -> Result<(), Failure> {
    let steps = thens
        .into_iter()
        .enumerate()
        .map(|(index, observation)| -> Step<'static, (), Failure> {
            let outcome = outcome.clone();
            let variables = variables.clone();
            Box::new(move |()| {
                debug!(index, "running observation");
                observation.inspect(outcome, variables, catch_panics).boxed_local()
            })
        });

    sequence::chain(steps, ()).await.into_result()
}

/// Declare and run a single anonymous test case
///
/// Resolves to `Ok(())` when the case passes and to its captured failure otherwise.
pub async fn test<F>(define: F) -> anyhow::Result<()>
where
    F: FnOnce(&Scenario) -> anyhow::Result<()>,
{
    TestCase::declare("test", &(), |scenario, _| define(scenario))
        .run()
        .await
        .into_result()
}
