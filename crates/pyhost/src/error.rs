//! Common error types for pyhost components.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A Python exception converted to plain host data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignError {
    /// Exception type name, e.g. `ValueError`
    pub kind: String,
    /// `str()` of the exception value
    pub message: String,
    /// Formatted traceback, when the exception carried one
    pub traceback: Option<String>,
}

impl fmt::Display for ForeignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Common error type for pyhost operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A live interpreter handle already exists in this process
    #[error("python interpreter is already initialized")]
    AlreadyInitialized,

    /// The interpreter was finalized and cannot be used or restarted
    #[error("python interpreter has been finalized")]
    Finalized,

    /// `Py_FinalizeEx` returned a non-zero status
    #[error("python interpreter finalization failed with status {0}")]
    Finalize(i32),

    /// Name not present in the `__main__` namespace
    #[error("name '{0}' is not defined in __main__")]
    Lookup(String),

    /// Name resolved to something that cannot be called
    #[error("'{0}' is not callable")]
    NotCallable(String),

    /// Exception raised by Python code
    #[error("python raised {0}")]
    Foreign(ForeignError),

    /// Input that cannot be handed to the interpreter
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Wrap a lower-level failure with a short description of what was attempted.
    pub fn context(msg: impl Into<String>, source: impl fmt::Display) -> Self {
        Error::Internal(format!("{}: {}", msg.into(), source))
    }

    /// Whether the failure originated inside the interpreter rather than in host code.
    pub fn is_foreign(&self) -> bool {
        matches!(
            self,
            Error::Lookup(_) | Error::NotCallable(_) | Error::Foreign(_)
        )
    }
}

/// Result type alias using pyhost Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_context_message() {
        let err = Error::context("failed to import sys module", "ModuleNotFoundError");
        assert_eq!(
            err.to_string(),
            "failed to import sys module: ModuleNotFoundError"
        );
        assert!(!err.is_foreign());
    }

    #[test]
    fn test_foreign_display() {
        let err = Error::Foreign(ForeignError {
            kind: "ValueError".to_string(),
            message: "bad value".to_string(),
            traceback: None,
        });
        assert_eq!(err.to_string(), "python raised ValueError: bad value");
        assert!(err.is_foreign());
    }

    #[test]
    fn test_foreign_display_without_message() {
        let err = ForeignError {
            kind: "StopIteration".to_string(),
            message: String::new(),
            traceback: None,
        };
        assert_eq!(err.to_string(), "StopIteration");
    }

    #[test]
    fn test_lookup_names_missing_function() {
        let err = Error::Lookup("print_list".to_string());
        assert!(err.to_string().contains("print_list"));
        assert!(err.is_foreign());
    }
}
