//! Service Error Types

use thiserror::Error;

/// Result type for dispatcher calls
pub type Result<T> = std::result::Result<T, ActionError>;

/// Declared failures of a control call
///
/// A controller reporting `false` from `apply` is not an error here; these
/// are routing failures surfaced to the caller as a failed call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// No controller registered under the name
    #[error("Unknown controller {0}")]
    UnknownController(String),

    /// Controller does not declare the action
    #[error("Not supported action: {action} (controller {controller})")]
    UnsupportedAction {
        /// Controller name
        controller: String,
        /// Requested action
        action: String,
    },
}

/// Failure to notify one subscriber
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// Subscriber end is gone
    #[error("Subscriber disconnected")]
    Disconnected,

    /// Subscriber could not take the event
    #[error("Subscriber rejected event: {0}")]
    Rejected(String),
}
