//! Bridge facade
//!
//! The two operations exposed to callers. Session work is blocking, so each
//! call runs on tokio's blocking pool; whatever happens there, including a
//! panic, comes back as a formatted response.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::error::ErrorKind;
use crate::executor::{ExecutionEngine, ExecutionStage, Outcome};
use crate::marshal::JsonValue;
use crate::session::SessionHandle;
use crate::workspace::fetch_variable;

/// Characters of submitted code echoed into the request log.
const LOGGED_CODE_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunCodeResponse {
    Success {
        output: String,
    },
    Error {
        error_type: ErrorKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<ExecutionStage>,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GetVariableResponse {
    Success {
        variable: String,
        value: JsonValue,
    },
    Error {
        error_type: ErrorKind,
        message: String,
    },
}

impl RunCodeResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, RunCodeResponse::Error { .. })
    }
}

impl GetVariableResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, GetVariableResponse::Error { .. })
    }
}

/// Entry point for both operations; cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    session: Arc<dyn SessionHandle>,
    engine: Arc<ExecutionEngine>,
}

impl Bridge {
    pub fn new(session: Arc<dyn SessionHandle>, engine: ExecutionEngine) -> Self {
        Self {
            session,
            engine: Arc::new(engine),
        }
    }

    /// Run `code` in the session.
    pub async fn run_code(&self, code: String) -> RunCodeResponse {
        info!("runMatlabCode request: {}...", preview(&code));

        let session = Arc::clone(&self.session);
        let engine = Arc::clone(&self.engine);
        let joined =
            tokio::task::spawn_blocking(move || engine.execute(&code, session.as_ref())).await;

        match joined {
            Ok(Outcome::Success { output }) => RunCodeResponse::Success { output },
            Ok(Outcome::Failure {
                stage,
                kind,
                detail,
            }) => RunCodeResponse::Error {
                error_type: kind,
                stage: Some(stage),
                message: detail,
            },
            Err(join_err) => RunCodeResponse::Error {
                error_type: ErrorKind::Unknown,
                stage: None,
                message: unexpected("runMatlabCode", join_err),
            },
        }
    }

    /// Read `variable_name` from the session workspace.
    pub async fn get_variable(&self, variable_name: String) -> GetVariableResponse {
        info!("getVariable request for: '{}'", variable_name);

        let session = Arc::clone(&self.session);
        let name = variable_name.clone();
        let joined =
            tokio::task::spawn_blocking(move || fetch_variable(&name, session.as_ref())).await;

        match joined {
            Ok(Ok(value)) => GetVariableResponse::Success {
                variable: variable_name,
                value,
            },
            Ok(Err(err)) => GetVariableResponse::Error {
                error_type: err.kind(),
                message: err.to_string(),
            },
            Err(join_err) => GetVariableResponse::Error {
                error_type: ErrorKind::Unknown,
                message: unexpected("getVariable", join_err),
            },
        }
    }
}

fn unexpected(operation: &str, err: JoinError) -> String {
    let reason = if err.is_panic() {
        let payload = err.into_panic();
        payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "worker panicked".to_string())
    } else {
        err.to_string()
    };
    error!("Unexpected error in {}: {}", operation, reason);
    format!("An unexpected error occurred: {}", reason)
}

fn preview(code: &str) -> &str {
    match code.char_indices().nth(LOGGED_CODE_CHARS) {
        Some((idx, _)) => &code[..idx],
        None => code,
    }
}
