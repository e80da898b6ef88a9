//! In-memory session used by tests and local experiments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{NativeValue, SessionError, SessionHandle};

/// Scripted reaction of a mock session call.
#[derive(Debug, Clone)]
pub enum MockBehavior<T> {
    Return(T),
    Fail(SessionError),
    Panic(String),
}

impl<T: Clone> MockBehavior<T> {
    fn resolve(&self) -> Result<T, SessionError> {
        match self {
            MockBehavior::Return(value) => Ok(value.clone()),
            MockBehavior::Fail(err) => Err(err.clone()),
            MockBehavior::Panic(message) => panic!("{}", message),
        }
    }
}

/// A session call observed by [`MockSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `contents` is what the script file held at call time, if readable.
    ExecuteScript {
        path: PathBuf,
        contents: Option<String>,
    },
    EvaluateCapture(String),
    WorkspaceContains(String),
    WorkspaceGet(String),
}

/// Session double with scripted responses and a call log.
pub struct MockSession {
    script: MockBehavior<()>,
    remove_script: bool,
    capture: MockBehavior<String>,
    workspace_fault: Option<SessionError>,
    variables: Mutex<HashMap<String, NativeValue>>,
    calls: Mutex<Vec<MockCall>>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    /// A session where scripts run cleanly, capture returns an empty
    /// transcript, and the workspace is empty.
    pub fn new() -> Self {
        Self {
            script: MockBehavior::Return(()),
            remove_script: false,
            capture: MockBehavior::Return(String::new()),
            workspace_fault: None,
            variables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(mut self, behavior: MockBehavior<()>) -> Self {
        self.script = behavior;
        self
    }

    /// Delete the script file while running it, before the bridge can.
    pub fn removing_script(mut self) -> Self {
        self.remove_script = true;
        self
    }

    pub fn with_capture(mut self, behavior: MockBehavior<String>) -> Self {
        self.capture = behavior;
        self
    }

    /// Make every workspace call fail with `err`.
    pub fn with_workspace_fault(mut self, err: SessionError) -> Self {
        self.workspace_fault = Some(err);
        self
    }

    pub fn with_variable(self, name: &str, value: NativeValue) -> Self {
        self.variables.lock().insert(name.to_string(), value);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn capture_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, MockCall::EvaluateCapture(_)))
            .count()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }
}

impl SessionHandle for MockSession {
    fn execute_script(&self, path: &Path) -> Result<(), SessionError> {
        self.record(MockCall::ExecuteScript {
            path: path.to_path_buf(),
            contents: std::fs::read_to_string(path).ok(),
        });
        if self.remove_script {
            let _ = std::fs::remove_file(path);
        }
        self.script.resolve()
    }

    fn evaluate_capture(&self, code: &str) -> Result<String, SessionError> {
        self.record(MockCall::EvaluateCapture(code.to_string()));
        self.capture.resolve()
    }

    fn workspace_contains(&self, name: &str) -> Result<bool, SessionError> {
        self.record(MockCall::WorkspaceContains(name.to_string()));
        if let Some(err) = &self.workspace_fault {
            return Err(err.clone());
        }
        Ok(self.variables.lock().contains_key(name))
    }

    fn workspace_get(&self, name: &str) -> Result<NativeValue, SessionError> {
        self.record(MockCall::WorkspaceGet(name.to_string()));
        if let Some(err) = &self.workspace_fault {
            return Err(err.clone());
        }
        self.variables
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::Execution(format!("Undefined variable '{}'.", name)))
    }
}
