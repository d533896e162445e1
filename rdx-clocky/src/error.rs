//! Error types returned by clock operations.

use crate::common::Status;
use thiserror::Error;

/// Errors raised synchronously by the `Clock` API.
///
/// Every error is returned before any state is touched, so the clock stays in
/// the status it had before the failing call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Invalid argument for `{parameter}`: expected {expected}, received \"{received}\"")]
    InvalidArgument {
        parameter: &'static str,
        expected: &'static str,
        received: String,
    },

    #[error("`{operation}` requires a {required} clock. Current status \"{status}\"")]
    InvalidState {
        operation: &'static str,
        required: Status,
        status: Status,
    },

    #[error("Unknown event: the event must be one of {expected}. Received \"{name}\"")]
    UnknownEvent { name: String, expected: String },

    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),
}

pub type Result<T> = std::result::Result<T, ClockError>;
