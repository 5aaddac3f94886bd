//! Preconditions ("given") and their paired cleanups ("taken")

use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use tracing::debug;

use crate::failure::{capture, capture_async, Failure};
use crate::variables::TestVariables;

pub(crate) type SetupFn = Box<dyn FnOnce(TestVariables) -> anyhow::Result<TestVariables>>;
pub(crate) type AsyncSetupFn =
    Box<dyn FnOnce(TestVariables) -> LocalBoxFuture<'static, anyhow::Result<TestVariables>>>;
pub(crate) type CleanupFn = Box<dyn FnOnce(TestVariables) -> anyhow::Result<()>>;
pub(crate) type AsyncCleanupFn =
    Box<dyn FnOnce(TestVariables) -> LocalBoxFuture<'static, anyhow::Result<()>>>;

/// How a given produces its variables, resolved once at registration time
pub(crate) enum Setup {
    /// A plain mapping
    Value(TestVariables),

    /// An already-started computation of a mapping
    Deferred(LocalBoxFuture<'static, anyhow::Result<TestVariables>>),

    /// A function of the variables accumulated so far
    Compute(SetupFn),

    /// An asynchronous function of the variables accumulated so far
    ComputeAsync(AsyncSetupFn),
}

impl Setup {
    /// Produce the partial mapping this given contributes
    pub(crate) fn produce(
        self,
        variables: TestVariables,
        catch_panics: bool,
    ) -> LocalBoxFuture<'static, Result<TestVariables, Failure>> {
        match self {
            Setup::Value(partial) => future::ready(Ok(partial)).boxed_local(),
            Setup::Deferred(pending) => capture_async(catch_panics, pending).boxed_local(),
            Setup::Compute(setup) => {
                future::ready(capture(catch_panics, move || setup(variables))).boxed_local()
            }
            Setup::ComputeAsync(setup) => async move {
                let pending = capture(catch_panics, move || Ok(setup(variables)))?;
                capture_async(catch_panics, pending).await
            }
            .boxed_local(),
        }
    }
}

/// Cleanup paired with a given
pub(crate) enum Cleanup {
    Sync(CleanupFn),
    Async(AsyncCleanupFn),
}

impl Cleanup {
    pub(crate) async fn run(
        self,
        variables: TestVariables,
        catch_panics: bool,
    ) -> Result<(), Failure> {
        match self {
            Cleanup::Sync(cleanup) => capture(catch_panics, move || cleanup(variables)),
            Cleanup::Async(cleanup) => {
                let pending = capture(catch_panics, move || Ok(cleanup(variables)))?;
                capture_async(catch_panics, pending).await
            }
        }
    }
}

/// A declared precondition
pub(crate) struct GivenEntry {
    pub(crate) setup: Setup,
    pub(crate) taken: Option<Cleanup>,
}

impl GivenEntry {
    pub(crate) fn new(setup: Setup) -> Self {
        Self { setup, taken: None }
    }
}

/// What happened to one setup or cleanup step during a run
#[derive(Debug, Clone)]
pub enum StepStatus {
    /// The step never ran
    Skipped,

    /// The step ran to completion
    Succeeded,

    /// The step ran and failed
    Failed(Failure),
}

/// Per-run record of a setup or cleanup step, indexed by given declaration order
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub index: usize,
    pub status: StepStatus,
}

impl StepRecord {
    pub fn ran(&self) -> bool {
        !matches!(self.status, StepStatus::Skipped)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, StepStatus::Succeeded)
    }

    pub fn error(&self) -> Option<&Failure> {
        match &self.status {
            StepStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Build setup records from how far the setup chain got
pub(crate) fn setup_records(
    count: usize,
    completed: usize,
    error: Option<&Failure>,
) -> Vec<StepRecord> {
    (0..count)
        .map(|index| {
            let status = if index < completed {
                StepStatus::Succeeded
            } else {
                match (index == completed, error) {
                    (true, Some(error)) => StepStatus::Failed(error.clone()),
                    _ => StepStatus::Skipped,
                }
            };
            StepRecord { index, status }
        })
        .collect()
}

/// Run cleanups in reverse declaration order
///
/// Only the first `completed` givens set up successfully; the rest contribute
/// nothing. A failing cleanup does not stop the remaining ones.
pub(crate) async fn tear_down(
    cleanups: Vec<Option<Cleanup>>,
    completed: usize,
    variables: &TestVariables,
    catch_panics: bool,
) -> Vec<StepRecord> {
    let mut records = Vec::with_capacity(cleanups.len());

    for (index, cleanup) in cleanups.into_iter().enumerate().rev() {
        let status = if index >= completed {
            StepStatus::Skipped
        } else {
            match cleanup {
                None => StepStatus::Succeeded,
                Some(cleanup) => {
                    debug!(index, "running cleanup");
                    match cleanup.run(variables.clone(), catch_panics).await {
                        Ok(()) => StepStatus::Succeeded,
                        Err(error) => {
                            tracing::warn!(index, error = %error, "cleanup failed");
                            StepStatus::Failed(error)
                        }
                    }
                }
            }
        };
        records.push(StepRecord { index, status });
    }

    records
}
