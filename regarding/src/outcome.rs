//! Normalized outcome of the action under test

use serde_json::Value;

use crate::failure::Failure;

/// What happened when the action under test ran
///
/// Synchronous actions either return a value or throw; asynchronous actions
/// either fulfill or reject. A failed action is not a failed test: the outcome
/// is handed to the observations, which decide what it means.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The action returned a value synchronously
    Returned(Value),

    /// The action failed synchronously (an `Err` return or a panic)
    Threw(Failure),

    /// The action returned a future that completed with a value
    Fulfilled(Value),

    /// The action returned a future that failed
    Rejected(Failure),
}

impl Outcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Returned(value) | Outcome::Fulfilled(value) => Some(value),
            Outcome::Threw(_) | Outcome::Rejected(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Failure> {
        match self {
            Outcome::Threw(error) | Outcome::Rejected(error) => Some(error),
            Outcome::Returned(_) | Outcome::Fulfilled(_) => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Outcome::Returned(_) | Outcome::Fulfilled(_))
    }

    pub fn threw(&self) -> bool {
        matches!(self, Outcome::Threw(_))
    }

    pub fn rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    /// Whether the action handed back a future rather than a plain value
    pub fn promised(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_) | Outcome::Rejected(_))
    }

    pub fn into_result(self) -> Result<Value, Failure> {
        match self {
            Outcome::Returned(value) | Outcome::Fulfilled(value) => Ok(value),
            Outcome::Threw(error) | Outcome::Rejected(error) => Err(error),
        }
    }
}
