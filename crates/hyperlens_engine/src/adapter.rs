//! Engine Adapter: runs the inspection engine as a subprocess and parses its
//! JSON answer.
//!
//! ## Contract
//! - One process per invocation. The argument list is the only input channel;
//!   there is no session or connection reuse.
//! - Stdout and stderr are captured in full before anything is parsed.
//! - Exit 0: stdout must hold one JSON object with a boolean `success`.
//! - Non-zero exit: [`EngineError::EngineFailure`] with stderr verbatim.
//! - No retries and no timeout; callers cancel through a
//!   [`CancellationToken`] or by dropping the future.
//!
//! ## Process groups
//! On Unix the engine is started as the leader of a new process group. The
//! vendor runtime spawns its own server process, so cancellation signals the
//! whole group rather than only the direct child.

use async_trait::async_trait;
use hyperlens_protocol::{EngineResponse, EngineSettings};
use serde_json::Value;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::EngineError;

/// The single capability the rest of the system needs from an engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Run one engine invocation with `argv` (operation verb first).
    async fn invoke(
        &self,
        argv: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<EngineResponse, EngineError>;
}

/// Engine backed by an external program.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl ProcessEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            program: settings.program.clone(),
            leading_args: settings.args.iter().map(OsString::from).collect(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Resolve the program on PATH, if it can be found.
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    fn command(&self, argv: &[OsString]) -> Command {
        let mut std_cmd = std::process::Command::new(&self.program);
        std_cmd
            .args(&self.leading_args)
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Engine for ProcessEngine {
    async fn invoke(
        &self,
        argv: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<EngineResponse, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let verb = argv
            .first()
            .map(|v| v.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut child = self
            .command(argv)
            .spawn()
            .map_err(|err| EngineError::LaunchFailure {
                program: self.program.display().to_string(),
                message: err.to_string(),
            })?;
        let mut group = ProcessGroupGuard::new(child.id());
        debug!(
            "Spawned engine {} (pid={:?}) for '{}'",
            self.program.display(),
            child.id(),
            verb
        );

        let outcome = tokio::select! {
            result = capture(&mut child) => Outcome::Finished(result),
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        let captured = match outcome {
            Outcome::Finished(Ok(captured)) => {
                group.disarm();
                captured
            }
            Outcome::Finished(Err(err)) => {
                group.kill();
                reap(&mut child).await;
                return Err(EngineError::EngineFailure {
                    code: None,
                    stderr: format!("failed to capture engine output: {}", err),
                });
            }
            Outcome::Cancelled => {
                group.kill();
                reap(&mut child).await;
                warn!("Engine '{}' cancelled; process group terminated", verb);
                return Err(EngineError::Cancelled);
            }
        };

        let stderr = String::from_utf8_lossy(&captured.stderr).into_owned();
        let stdout = String::from_utf8_lossy(&captured.stdout).into_owned();

        if !captured.status.success() {
            let code = captured.status.code();
            info!("Engine '{}' exited with {:?}", verb, code);
            let message = if stderr.trim().is_empty() {
                error_from_stdout(&stdout)
                    .unwrap_or_else(|| format!("engine exited with status {}", captured.status))
            } else {
                stderr
            };
            return Err(EngineError::EngineFailure {
                code,
                stderr: message,
            });
        }

        if !stderr.trim().is_empty() {
            debug!("Engine '{}' stderr: {}", verb, stderr.trim());
        }

        let document = parse_document(&stdout).map_err(|reason| EngineError::MalformedResponse {
            reason,
            raw: stdout.clone(),
        })?;
        EngineResponse::from_document(document)
            .map_err(|reason| EngineError::MalformedResponse { reason, raw: stdout })
    }
}

enum Outcome {
    Finished(io::Result<Captured>),
    Cancelled,
}

struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Drain both pipes and wait for exit.
async fn capture(child: &mut Child) -> io::Result<Captured> {
    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "engine stdout not captured"))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "engine stderr not captured"))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let (_, _, status) = tokio::try_join!(
        stdout_pipe.read_to_end(&mut stdout),
        stderr_pipe.read_to_end(&mut stderr),
        child.wait(),
    )?;

    Ok(Captured {
        status,
        stdout,
        stderr,
    })
}

/// Kill the direct child (if still running) and wait for it.
async fn reap(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Parse stdout as one JSON document.
///
/// Stray lines printed before the document (warnings from the vendor runtime)
/// are skipped and logged; anything else that fails to parse is an error.
fn parse_document(stdout: &str) -> Result<Value, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err("engine produced no output".to_string());
    }
    let first_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let mut offset = 0;
    for line in stdout.split_inclusive('\n') {
        if line.trim_start().starts_with('{') && offset > 0 {
            if let Ok(value) = serde_json::from_str::<Value>(stdout[offset..].trim()) {
                warn!(
                    "Skipped non-JSON engine output: {}",
                    stdout[..offset].trim()
                );
                return Ok(value);
            }
        }
        offset += line.len();
    }

    Err(first_error.to_string())
}

/// The engine prints `{"success": false, "error": ...}` before exiting 1 on
/// critical errors; recover that message when stderr is empty.
fn error_from_stdout(stdout: &str) -> Option<String> {
    let document = parse_document(stdout).ok()?;
    document
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Terminates the engine's process group unless disarmed.
///
/// Dropping an in-flight invocation (an abandoned HTTP request) drops this
/// guard, which takes the vendor server process down with the engine.
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            #[cfg(unix)]
            {
                // SAFETY: killpg only sends a signal; an already-exited group yields ESRCH.
                let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
                if rc != 0 {
                    debug!(
                        "killpg({}) failed: {}",
                        pgid,
                        io::Error::last_os_error()
                    );
                }
            }
            #[cfg(not(unix))]
            let _ = pgid;
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}
