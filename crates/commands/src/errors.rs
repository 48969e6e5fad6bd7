//! Error types for aggregation operations.
//!
//! [`AggregationError`] is the single failure type returned by every builder,
//! interpreter, and operation. Exactly one of a result or an error is produced
//! per call; no variant is ever converted into an empty success.
//!
//! ## Propagation
//!
//! - `ConfigurationError` is raised while the command is being built, before
//!   anything is submitted.
//! - `CommandError`, `ExecutionError` and `TransportError` are produced after
//!   submission and returned to the caller unchanged. Nothing is retried here;
//!   retry policy belongs to the executor behind the port.

use thiserror::Error;

use crate::Document;

// ---------------------------------------------------------------------------
// Transport failures
// ---------------------------------------------------------------------------

/// A failure reported by the Executor Port itself (connection lost, timeout,
/// serialisation failure on the wire).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ---------------------------------------------------------------------------
// Operation-level errors
// ---------------------------------------------------------------------------

/// Errors produced by map/reduce, group, and aggregate operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    /// The caller's input violates a precondition.
    ///
    /// Produced by: missing `out` option, a read preference combined with a
    /// non-inline output, malformed positional arguments.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the violated precondition.
        message: String,
    },

    /// The server answered with `ok != 1` or reported `err` / `errmsg`.
    #[error("Command failed: {message}")]
    CommandError {
        /// The server's error text, or a generic description when it gave none.
        message: String,
        /// The full response document, kept for diagnostics.
        response: Document,
    },

    /// A submission completed without a usable response.
    #[error("Execution error: {message}")]
    ExecutionError {
        /// Description of what was missing from the response.
        message: String,
    },

    /// Propagated unchanged from the Executor Port.
    #[error("Transport error: {0}")]
    TransportError(#[from] TransportError),
}

impl AggregationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionError {
            message: message.into(),
        }
    }

    /// Builds a `CommandError` from a server response document.
    ///
    /// The message is taken from `errmsg`, then `err`, then `$err`.
    pub fn from_response(response: Document) -> Self {
        let message = ["errmsg", "err", "$err"]
            .iter()
            .filter_map(|field| response.get(field))
            .find(|value| value.is_truthy())
            .map(|value| match value.as_str() {
                Some(text) => text.to_owned(),
                None => value.to_json().to_string(),
            })
            .unwrap_or_else(|| "command failed without an error message".to_owned());

        Self::CommandError { message, response }
    }

    /// Returns `true` for errors raised before any submission took place.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigurationError { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AggregationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(json).unwrap()
    }

    #[test]
    fn command_error_prefers_errmsg() {
        let err = AggregationError::from_response(doc(json!({ "ok": 0, "err": "a", "errmsg": "b" })));
        let AggregationError::CommandError { message, response } = err else {
            panic!("expected a command error");
        };
        assert_eq!(message, "b");
        assert_eq!(response.get("err").and_then(|v| v.as_str()), Some("a"));
    }

    #[test]
    fn command_error_without_text_uses_generic_message() {
        let err = AggregationError::from_response(doc(json!({ "ok": 0 })));
        assert_eq!(
            err.to_string(),
            "Command failed: command failed without an error message"
        );
    }

    #[test]
    fn transport_errors_convert() {
        let err: AggregationError = TransportError::new("socket closed").into();
        assert_eq!(err.to_string(), "Transport error: socket closed");
        assert!(!err.is_configuration());
    }
}
