//! Error types for test declaration and step execution

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeclarationError>;

/// Misuse of the declaration API, detected while a test case is being declared
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("At most one action per test case: '{description}' already declares one")]
    DuplicateAction { description: String },

    #[error("Declaration of '{description}' is closed; steps can no longer be registered")]
    Sealed { description: String },

    #[error("Test variables must be a JSON object, found {found}")]
    NotAnObject { found: String },
}

impl DeclarationError {
    pub fn duplicate_action(description: impl Into<String>) -> Self {
        Self::DuplicateAction {
            description: description.into(),
        }
    }

    pub fn sealed(description: impl Into<String>) -> Self {
        Self::Sealed {
            description: description.into(),
        }
    }

    pub fn not_an_object(found: impl Into<String>) -> Self {
        Self::NotAnObject {
            found: found.into(),
        }
    }
}

/// Failures raised by the engine itself while running a step
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Step panicked: {message}")]
    Panicked { message: String },
}

impl StepError {
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }
}
