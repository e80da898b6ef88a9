//! Session abstraction
//!
//! A session is one long-lived MATLAB-compatible interpreter with a persistent
//! workspace. The bridge talks to it only through [`SessionHandle`], so the
//! real interpreter process and the in-memory [`MockSession`] are
//! interchangeable.

pub mod mock;
pub mod process;
pub mod protocol;

use std::path::Path;

use thiserror::Error;

pub use mock::{MockBehavior, MockCall, MockSession};
pub use process::ProcessSession;

/// Failure reported by a session call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session ran the command but the code raised an error.
    #[error("{0}")]
    Execution(String),
    /// The session could not be reached or answered unintelligibly.
    #[error("{0}")]
    Engine(String),
}

/// Value as held in the session workspace.
///
/// Array data is stored in row-major order regardless of the session's own
/// storage layout.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Scalar(f64),
    Boolean(bool),
    Text(String),
    NumericArray { shape: Vec<usize>, data: Vec<f64> },
    BooleanArray { shape: Vec<usize>, data: Vec<bool> },
    /// Any type the session cannot hand over structurally. `display` is the
    /// session's own rendering of the value, when it produced one.
    Opaque {
        type_tag: String,
        display: Option<String>,
    },
}

impl NativeValue {
    /// Session-side class name, used in diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            NativeValue::Scalar(_) | NativeValue::NumericArray { .. } => "double",
            NativeValue::Boolean(_) | NativeValue::BooleanArray { .. } => "logical",
            NativeValue::Text(_) => "char",
            NativeValue::Opaque { type_tag, .. } => type_tag,
        }
    }
}

/// Capability for one live session.
///
/// All calls block until the session answers. Implementations must be safe to
/// share between request handlers and must not interleave commands.
pub trait SessionHandle: Send + Sync {
    /// Run a script file with no return values.
    fn execute_script(&self, path: &Path) -> Result<(), SessionError>;

    /// Evaluate code interactively and return the console transcript.
    fn evaluate_capture(&self, code: &str) -> Result<String, SessionError>;

    /// Whether `name` is defined in the workspace.
    fn workspace_contains(&self, name: &str) -> Result<bool, SessionError>;

    /// Fetch the value bound to `name`.
    fn workspace_get(&self, name: &str) -> Result<NativeValue, SessionError>;
}
