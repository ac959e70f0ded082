//! Error types for the service bus core

use thiserror::Error;

use crate::services::ServiceState;
use strand_common::ValueError;

/// Result type for bus operations
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors surfaced by node and registry operations
#[derive(Error, Debug)]
pub enum NodeError {
    /// Operation attempted before `start` or after `stop`
    #[error("Node is not started")]
    NotStarted,

    /// `start` called on a node that is already running
    #[error("Node is already started")]
    AlreadyStarted,

    /// Topic parse failure
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Neither a local nor a remote handler resolved the request
    #[error("No handler for {0}")]
    NoHandler(String),

    /// Action requires the service to be Running or Paused
    #[error("Invalid service state: {0}")]
    InvalidServiceState(ServiceState),

    /// Handler returned an error; the message is propagated verbatim
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Remote transport adapter failure
    #[error("Remote error: {0}")]
    RemoteError(String),

    /// Unknown subscription id
    #[error("Subscription {0} not found")]
    NotFound(String),

    /// Service start or `on` wait elapsed
    #[error("Operation timed out")]
    Timeout,

    /// Service registration rejected
    #[error("Registration error: {0}")]
    Registration(String),

    /// Payload encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<ValueError> for NodeError {
    fn from(err: ValueError) -> Self {
        NodeError::Serialization(err.to_string())
    }
}
