//! Error types

use thiserror::Error;
use tokio::task::JoinError;

/// A rule could not produce a verdict for its input.
///
/// This is distinct from a rule deciding the input is invalid: a rule that
/// fails with this error has said nothing about validity.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuleError {
    /// Error message
    pub message: String,
}

impl RuleError {
    /// Create a new rule error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for RuleError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<String> for RuleError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for RuleError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Error raised by a batch validation (one field or a whole form).
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// A rule failed to evaluate. The first such failure aborts the batch.
    #[error("rule '{rule}' could not be evaluated: {source}")]
    Rule {
        /// Name of the failing rule.
        rule: String,
        /// What the rule reported.
        #[source]
        source: RuleError,
    },

    /// An evaluation task panicked.
    #[error("rule evaluation panicked")]
    Panicked,

    /// The validation was cancelled before its results were delivered.
    #[error("validation cancelled")]
    Cancelled,
}

impl From<JoinError> for ValidationError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            Self::Panicked
        } else {
            Self::Cancelled
        }
    }
}

/// Errors that can occur when registering a field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Field names are registry keys and must not be empty.
    #[error("field name must not be empty")]
    EmptyName,

    /// A validator only tracks fields that observe validation outcomes.
    #[error("field '{0}' is not validatable")]
    NotValidatable(String),
}
