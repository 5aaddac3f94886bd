//! Captured step failures
//!
//! Every failure raised by a user step (an `Err` return, or a panic) is turned
//! into a [`Failure`]. Failures are cheap to clone so the same outcome can be
//! handed to every observation of a test case.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;

use crate::error::StepError;

/// A captured failure from a setup, action, observation or cleanup step
#[derive(Clone)]
pub struct Failure(Arc<anyhow::Error>);

impl Failure {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(error.into()))
    }

    /// Build a failure from a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self::new(StepError::panicked(message))
    }

    /// The top-level error message
    pub fn message(&self) -> String {
        self.0.to_string()
    }

    pub fn is_panic(&self) -> bool {
        matches!(self.downcast_ref::<StepError>(), Some(StepError::Panicked { .. }))
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    pub fn as_error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

/// Run a synchronous step, turning `Err` and (optionally) panics into a [`Failure`]
pub(crate) fn capture<T, F>(catch_panics: bool, step: F) -> Result<T, Failure>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    if !catch_panics {
        return step().map_err(Failure::from);
    }

    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(result) => result.map_err(Failure::from),
        Err(payload) => Err(Failure::from_panic(payload)),
    }
}

/// Await a step future, turning `Err` and (optionally) panics while polling into a [`Failure`]
pub(crate) async fn capture_async<T, Fut>(catch_panics: bool, step: Fut) -> Result<T, Failure>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    if !catch_panics {
        return step.await.map_err(Failure::from);
    }

    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(result) => result.map_err(Failure::from),
        Err(payload) => Err(Failure::from_panic(payload)),
    }
}
