//! Interpreter child process session
//!
//! Starts MATLAB (or any interpreter that speaks the same language, such as
//! GNU Octave) with piped stdin/stdout and drives it with the frame protocol
//! from [`super::protocol`]. One command is in flight at a time.

use std::io::{BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::protocol::{self, Markers};
use super::{NativeValue, SessionError, SessionHandle};
use crate::config::EngineConfig;

struct EngineProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Session backed by an interpreter child process.
pub struct ProcessSession {
    prompt: String,
    markers: Markers,
    /// `None` once the process has died; later calls fail fast.
    process: Mutex<Option<EngineProcess>>,
}

impl ProcessSession {
    /// Start the interpreter and wait until it answers a first frame.
    pub fn spawn(config: &EngineConfig) -> Result<Self, SessionError> {
        let mut command = Command::new(&config.executable);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &config.working_directory {
            command.current_dir(dir);
        }

        info!(
            "Starting MATLAB session: {} {}",
            config.executable,
            config.args.join(" ")
        );
        let mut child = command.spawn().map_err(|e| {
            SessionError::Engine(format!("failed to start '{}': {}", config.executable, e))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Engine("no stdin on MATLAB process".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Engine("no stdout on MATLAB process".to_string()))?;

        let session = Self {
            prompt: config.prompt.clone(),
            markers: Markers::random(),
            process: Mutex::new(Some(EngineProcess {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            })),
        };

        // Swallows the startup banner and disables the pager.
        session.send("more off;")?;
        info!("MATLAB session is ready");
        Ok(session)
    }

    /// Run one frame and return its output, or the caught error.
    fn send(&self, body: &str) -> Result<String, SessionError> {
        let mut guard = self.process.lock();
        let process = guard.as_mut().ok_or_else(|| {
            SessionError::Engine("MATLAB session is no longer running".to_string())
        })?;

        let line = protocol::frame(body, &self.markers);
        debug!(bytes = line.len(), "Sending frame to MATLAB");

        let result = writeln!(process.stdin, "{}", line)
            .and_then(|_| process.stdin.flush())
            .map_err(|e| SessionError::Engine(format!("failed to write to MATLAB: {}", e)))
            .and_then(|_| {
                protocol::read_response(&mut process.stdout, &self.markers, &self.prompt)
            });

        match result {
            Ok(response) => response.into_result(),
            Err(err) => {
                warn!("MATLAB session lost: {}", err);
                if let Some(mut dead) = guard.take() {
                    let _ = dead.child.kill();
                    let _ = dead.child.wait();
                }
                Err(err)
            }
        }
    }
}

impl SessionHandle for ProcessSession {
    fn execute_script(&self, path: &Path) -> Result<(), SessionError> {
        self.send(&protocol::run_script_body(&path.to_string_lossy()))
            .map(|_| ())
    }

    fn evaluate_capture(&self, code: &str) -> Result<String, SessionError> {
        self.send(&protocol::eval_body(code))
    }

    fn workspace_contains(&self, name: &str) -> Result<bool, SessionError> {
        if !protocol::is_identifier(name) {
            return Ok(false);
        }
        let output = self.send(&protocol::exists_body(name))?;
        protocol::parse_exists(&output)
    }

    fn workspace_get(&self, name: &str) -> Result<NativeValue, SessionError> {
        if !protocol::is_identifier(name) {
            return Err(SessionError::Execution(format!(
                "'{}' is not a valid variable name",
                name
            )));
        }
        let output = self.send(&protocol::probe_body(name))?;
        protocol::parse_probe(&output)
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.get_mut().take() {
            let _ = writeln!(process.stdin, "exit");
            let _ = process.stdin.flush();
            drop(process.stdin);
            if let Ok(None) = process.child.try_wait() {
                let _ = process.child.kill();
            }
            let _ = process.child.wait();
            debug!("MATLAB session stopped");
        }
    }
}
