//! Chained step runner
//!
//! Folds a list of asynchronous steps into one sequential pipeline: each step
//! receives the value produced by the previous one, starting from an initial
//! value. The first failing step stops the chain.

use futures::future::LocalBoxFuture;

/// One link of a chain
pub type Step<'a, T, E> = Box<dyn FnOnce(T) -> LocalBoxFuture<'a, Result<T, E>> + 'a>;

/// Result of running a chain
#[derive(Debug)]
pub struct Chained<T, E> {
    /// Value produced by the last step that succeeded (or the initial value)
    pub value: T,

    /// Number of steps that completed successfully
    pub completed: usize,

    /// The error that stopped the chain, if any
    pub error: Option<E>,
}

impl<T, E> Chained<T, E> {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, E> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.value),
        }
    }
}

/// Run `steps` strictly one after another
///
/// Each step gets a copy of the current value, so the value that was current
/// when a step failed is still available in [`Chained::value`].
pub async fn chain<'a, T, E, I>(steps: I, initial: T) -> Chained<T, E>
where
    T: Clone,
    I: IntoIterator<Item = Step<'a, T, E>>,
{
    let mut value = initial;
    let mut completed = 0;

    for step in steps {
        match step(value.clone()).await {
            Ok(next) => {
                value = next;
                completed += 1;
            }
            Err(error) => {
                return Chained {
                    value,
                    completed,
                    error: Some(error),
                };
            }
        }
    }

    Chained {
        value,
        completed,
        error: None,
    }
}
