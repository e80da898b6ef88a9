//! Two-tier code execution
//!
//! Code is first written to a scratch script and run as a file. If the session
//! reports that the code itself failed, the same code is evaluated once more in
//! capture mode, which tolerates bare expressions and returns the console
//! transcript. Faults of the bridge or the session (I/O, broken pipe) end the
//! attempt immediately.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

use crate::config::ScratchConfig;
use crate::error::{BridgeError, ErrorKind};
use crate::session::SessionHandle;

/// Which tier produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStage {
    FileRun,
    CaptureEval,
}

/// Normalized result of one `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        output: String,
    },
    Failure {
        stage: ExecutionStage,
        kind: ErrorKind,
        detail: String,
    },
}

impl Outcome {
    fn failure(stage: ExecutionStage, err: &BridgeError) -> Self {
        Outcome::Failure {
            stage,
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

/// Transient script file holding submitted code.
///
/// Removed when dropped, on every path out of [`ExecutionEngine::execute`].
pub struct ScratchScript {
    path: PathBuf,
    /// Taken in `Drop` so removal errors can be logged.
    file: Option<TempPath>,
}

impl ScratchScript {
    /// Create a uniquely named script in `config`'s directory holding `code`.
    pub fn create(config: &ScratchConfig, code: &str) -> Result<Self, BridgeError> {
        let mut file = tempfile::Builder::new()
            .prefix(&config.prefix)
            .suffix(&format!(".{}", config.extension))
            .tempfile_in(config.resolved_directory())?;
        file.write_all(code.as_bytes())?;
        file.flush()?;
        // Close our handle so the interpreter can open the file on every platform.
        let file = file.into_temp_path();
        let path = file.to_path_buf();
        debug!("Wrote scratch script {}", path.display());
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl Drop for ScratchScript {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            match file.close() {
                Ok(()) => debug!("Cleaned up scratch script {}", self.path.display()),
                Err(e) => warn!(
                    "Could not clean up scratch script {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

/// States of one execution attempt.
enum Step {
    TryFile,
    TryCapture,
    Done(Outcome),
}

/// Whether a file-mode failure means "the code was wrong" and capture mode
/// deserves a try. Bridge and session faults never fall back.
pub fn falls_back_to_capture(err: &BridgeError) -> bool {
    matches!(err, BridgeError::Execution(_))
}

/// Runs code against a session with the file-then-capture strategy.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    scratch: ScratchConfig,
}

impl ExecutionEngine {
    pub fn new(scratch: ScratchConfig) -> Self {
        Self { scratch }
    }

    pub fn execute(&self, code: &str, session: &dyn SessionHandle) -> Outcome {
        let script = match ScratchScript::create(&self.scratch, code) {
            Ok(script) => script,
            Err(err) => {
                error!("Scratch script could not be written: {}", err);
                return Outcome::failure(ExecutionStage::FileRun, &err);
            }
        };

        let mut step = Step::TryFile;
        loop {
            step = match step {
                Step::TryFile => self.try_file(&script, session),
                Step::TryCapture => self.try_capture(code, session),
                Step::Done(outcome) => return outcome,
            };
        }
    }

    fn try_file(&self, script: &ScratchScript, session: &dyn SessionHandle) -> Step {
        debug!("Attempting to run code via scratch script {}", script.path().display());
        match session.execute_script(script.path()).map_err(BridgeError::from) {
            Ok(()) => {
                info!("Code executed successfully via scratch script {}", script.file_name());
                Step::Done(Outcome::Success {
                    output: format!(
                        "Code executed successfully via script file ({}).",
                        script.file_name()
                    ),
                })
            }
            Err(err) if falls_back_to_capture(&err) => {
                warn!("Script execution failed: {}. Falling back to capture mode", err);
                Step::TryCapture
            }
            Err(err) => {
                error!("Script execution could not be attempted: {}", err);
                Step::Done(Outcome::failure(ExecutionStage::FileRun, &err))
            }
        }
    }

    fn try_capture(&self, code: &str, session: &dyn SessionHandle) -> Step {
        let outcome = match session.evaluate_capture(code).map_err(BridgeError::from) {
            Ok(transcript) => {
                info!("Code executed successfully in capture mode");
                Outcome::Success { output: transcript }
            }
            Err(BridgeError::Execution(message)) => {
                error!("Capture mode also failed: {}", message);
                Outcome::Failure {
                    stage: ExecutionStage::CaptureEval,
                    kind: ErrorKind::ExecutionError,
                    detail: format!(
                        "MATLAB execution failed (tried script file then capture): {}",
                        message
                    ),
                }
            }
            Err(err) => {
                error!("Unexpected error in capture mode: {}", err);
                Outcome::failure(ExecutionStage::CaptureEval, &err)
            }
        };
        Step::Done(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MockBehavior, MockCall, MockSession, SessionError};

    fn engine_in(dir: &Path) -> ExecutionEngine {
        ExecutionEngine::new(ScratchConfig {
            directory: Some(dir.to_path_buf()),
            ..ScratchConfig::default()
        })
    }

    fn script_call(session: &MockSession) -> (PathBuf, Option<String>) {
        match session.calls().into_iter().next() {
            Some(MockCall::ExecuteScript { path, contents }) => (path, contents),
            other => panic!("expected a script call first, got {:?}", other),
        }
    }

    #[test]
    fn test_file_mode_success_reports_script_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new();

        let outcome = engine_in(dir.path()).execute("x = 5;", &session);

        let Outcome::Success { output } = outcome else {
            panic!("expected success");
        };
        assert!(output.contains("via script"));

        let (path, contents) = script_call(&session);
        assert_eq!(contents.as_deref(), Some("x = 5;"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("m"));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("mcp_bridge_"));
        assert!(!path.exists());
        assert_eq!(session.capture_calls(), 0);
    }

    #[test]
    fn test_execution_failure_falls_back_to_capture() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new()
            .with_script(MockBehavior::Fail(SessionError::Execution(
                "Error: This statement is incomplete.".into(),
            )))
            .with_capture(MockBehavior::Return("\nans =\n\n     2\n".into()));

        let outcome = engine_in(dir.path()).execute("1 + 1", &session);

        assert_eq!(
            outcome,
            Outcome::Success {
                output: "\nans =\n\n     2\n".into()
            }
        );
        let calls = session.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], MockCall::EvaluateCapture("1 + 1".into()));
        let (path, _) = script_call(&session);
        assert!(!path.exists());
    }

    #[test]
    fn test_both_tiers_failing_reports_capture_stage() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new()
            .with_script(MockBehavior::Fail(SessionError::Execution("bad".into())))
            .with_capture(MockBehavior::Fail(SessionError::Execution(
                "Undefined function or variable 'foo'.".into(),
            )));

        match engine_in(dir.path()).execute("foo", &session) {
            Outcome::Failure {
                stage,
                kind,
                detail,
            } => {
                assert_eq!(stage, ExecutionStage::CaptureEval);
                assert_eq!(kind, ErrorKind::ExecutionError);
                assert!(detail.contains("Undefined function or variable 'foo'."));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_capture_engine_fault_keeps_its_class() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new()
            .with_script(MockBehavior::Fail(SessionError::Execution("bad".into())))
            .with_capture(MockBehavior::Fail(SessionError::Engine("pipe closed".into())));

        match engine_in(dir.path()).execute("foo", &session) {
            Outcome::Failure { stage, kind, .. } => {
                assert_eq!(stage, ExecutionStage::CaptureEval);
                assert_eq!(kind, ErrorKind::EngineError);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_engine_fault_in_file_mode_does_not_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new()
            .with_script(MockBehavior::Fail(SessionError::Engine("session gone".into())));

        let outcome = engine_in(dir.path()).execute("x = 1;", &session);

        assert!(matches!(
            outcome,
            Outcome::Failure {
                stage: ExecutionStage::FileRun,
                kind: ErrorKind::EngineError,
                ..
            }
        ));
        assert_eq!(session.capture_calls(), 0);
        let (path, _) = script_call(&session);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_write_failure_never_reaches_session() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let session = MockSession::new();

        let outcome = engine_in(&missing).execute("x = 1;", &session);

        assert!(matches!(
            outcome,
            Outcome::Failure {
                stage: ExecutionStage::FileRun,
                kind: ErrorKind::IOFault,
                ..
            }
        ));
        assert!(session.calls().is_empty());
    }

    #[test]
    fn test_scratch_removed_when_session_panics() {
        let dir = tempfile::tempdir().unwrap();
        let session =
            MockSession::new().with_script(MockBehavior::Panic("engine crashed".into()));
        let engine = engine_in(dir.path());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.execute("x = 1;", &session)
        }));

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_failure_keeps_success() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new().removing_script();

        let outcome = engine_in(dir.path()).execute("x = 5;", &session);

        assert!(matches!(outcome, Outcome::Success { .. }));
        let (path, contents) = script_call(&session);
        assert_eq!(contents.as_deref(), Some("x = 5;"));
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_scripts_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScratchConfig {
            directory: Some(dir.path().to_path_buf()),
            ..ScratchConfig::default()
        };
        let a = ScratchScript::create(&config, "a = 1;").unwrap();
        let b = ScratchScript::create(&config, "b = 2;").unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read_to_string(b.path()).unwrap(), "b = 2;");
    }

    #[test]
    fn test_fallback_predicate() {
        assert!(falls_back_to_capture(&BridgeError::Execution("x".into())));
        assert!(!falls_back_to_capture(&BridgeError::Engine("x".into())));
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!falls_back_to_capture(&BridgeError::Io(io)));
    }
}
