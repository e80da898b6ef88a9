//! Error taxonomy shared by the bridge components.

use serde::Serialize;
use thiserror::Error;

use crate::session::SessionError;

/// Error categories reported to callers in the `error_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Bad caller input; rejected before the session is contacted.
    InvalidArgument,
    /// The named variable does not exist in the workspace.
    NotFound,
    /// The submitted code itself failed inside the session.
    ExecutionError,
    /// Communication with the session broke down.
    EngineError,
    /// Scratch script I/O failed.
    IOFault,
    /// A marshalled value could not be encoded as JSON.
    Unserializable,
    /// Any fault not otherwise classified.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ExecutionError => "ExecutionError",
            ErrorKind::EngineError => "EngineError",
            ErrorKind::IOFault => "IOFault",
            ErrorKind::Unserializable => "Unserializable",
            ErrorKind::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Execution(String),

    #[error("MATLAB engine error: {0}")]
    Engine(String),

    #[error("File operation error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unserializable(String),

    #[error("An unexpected error occurred: {0}")]
    Unknown(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BridgeError::NotFound(_) => ErrorKind::NotFound,
            BridgeError::Execution(_) => ErrorKind::ExecutionError,
            BridgeError::Engine(_) => ErrorKind::EngineError,
            BridgeError::Io(_) => ErrorKind::IOFault,
            BridgeError::Unserializable(_) => ErrorKind::Unserializable,
            BridgeError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl From<SessionError> for BridgeError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Execution(message) => BridgeError::Execution(message),
            SessionError::Engine(message) => BridgeError::Engine(message),
        }
    }
}
