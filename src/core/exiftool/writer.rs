//! Writers that apply prepared tag lists through exiftool.

use super::{PreparedWrite, ToolCapability, COMMON_WRITE_ARGS};
use crate::error::ToolError;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// Applies prepared writes to files on disk
pub trait MetadataWriter: Send {
    /// Apply a whole batch in one go. Any error fails the batch.
    fn write_batch(&mut self, batch: &[PreparedWrite]) -> Result<(), ToolError>;

    /// Apply a single write on its own
    fn write_one(&mut self, write: &PreparedWrite) -> Result<(), ToolError>;

    /// Release any long-lived resources
    fn close(&mut self) -> Result<(), ToolError> {
        Ok(())
    }
}

/// [`MetadataWriter`] backed by the exiftool executable.
///
/// Batches go through one persistent `-stay_open` process, started on the
/// first batch; single retries run a process of their own.
pub struct ExifToolWriter {
    capability: ToolCapability,
    session: Option<StayOpenSession>,
}

impl ExifToolWriter {
    pub fn new(capability: ToolCapability) -> Self {
        Self {
            capability,
            session: None,
        }
    }

    fn ensure_available(&self) -> Result<(), ToolError> {
        if self.capability.available {
            Ok(())
        } else {
            Err(ToolError::Unavailable)
        }
    }

    fn write_stay_open(&mut self, batch: &[PreparedWrite]) -> Result<(), ToolError> {
        if self.session.is_none() {
            self.session = Some(StayOpenSession::start(&self.capability.program)?);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(ToolError::Protocol("session missing".to_string()));
        };

        match session.execute_all(batch) {
            Ok(()) => Ok(()),
            Err(e) => {
                // A broken session is not reused; the next batch starts a fresh one
                if let Some(session) = self.session.take() {
                    session.kill();
                }
                Err(e)
            }
        }
    }
}

impl MetadataWriter for ExifToolWriter {
    fn write_batch(&mut self, batch: &[PreparedWrite]) -> Result<(), ToolError> {
        self.ensure_available()?;
        if batch.is_empty() {
            return Ok(());
        }
        self.write_stay_open(batch)
    }

    fn write_one(&mut self, write: &PreparedWrite) -> Result<(), ToolError> {
        self.ensure_available()?;
        let mut command = Command::new(&self.capability.program);
        command.args(COMMON_WRITE_ARGS).args(&write.args);
        run_to_completion(command)
    }

    fn close(&mut self) -> Result<(), ToolError> {
        match self.session.take() {
            Some(session) => session.close(),
            None => Ok(()),
        }
    }
}

impl Drop for ExifToolWriter {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close() {
                debug!(error = %e, "exiftool session did not close cleanly");
            }
        }
    }
}

fn run_to_completion(mut command: Command) -> Result<(), ToolError> {
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ToolError::Spawn { source })?;
    if output.status.success() {
        return Ok(());
    }
    let mut combined = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr.trim());
    }
    Err(ToolError::Failed {
        status: output.status.to_string(),
        stderr: combined,
    })
}

/// A `-stay_open` exiftool process.
///
/// Arguments go to stdin one per line; each command ends with a numbered
/// `-execute` and is acknowledged by a matching `{readyN}` line on stdout.
struct StayOpenSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl StayOpenSession {
    fn start(program: &str) -> Result<Self, ToolError> {
        let mut child = Command::new(program)
            .args(["-stay_open", "True", "-@", "-", "-common_args"])
            .args(COMMON_WRITE_ARGS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ToolError::Spawn { source })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => {
                info!(program, "Started exiftool stay-open session");
                Ok(Self {
                    child,
                    stdin,
                    stdout: BufReader::new(stdout),
                    next_id: 1,
                })
            }
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ToolError::Protocol("exiftool pipes unavailable".to_string()))
            }
        }
    }

    /// Queue every write, then wait for each acknowledgement in order
    fn execute_all(&mut self, batch: &[PreparedWrite]) -> Result<(), ToolError> {
        let first_id = self.next_id;
        for write in batch {
            let id = self.next_id;
            self.next_id += 1;
            for arg in &write.args {
                // Argument files are line based
                let line = arg.replace(['\r', '\n'], " ");
                writeln!(self.stdin, "{}", line).map_err(broken_pipe)?;
            }
            writeln!(self.stdin, "-execute{}", id).map_err(broken_pipe)?;
        }
        self.stdin.flush().map_err(broken_pipe)?;

        for id in first_id..self.next_id {
            self.await_ready(id)?;
        }
        Ok(())
    }

    fn await_ready(&mut self, id: u64) -> Result<(), ToolError> {
        let marker = format!("{{ready{}}}", id);
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.stdout.read_line(&mut line).map_err(broken_pipe)?;
            if read == 0 {
                return Err(ToolError::Protocol(
                    "exiftool exited before acknowledging a write".to_string(),
                ));
            }
            let trimmed = line.trim();
            if trimmed == marker {
                return Ok(());
            }
            if !trimmed.is_empty() {
                debug!(output = trimmed, "exiftool");
            }
        }
    }

    fn close(mut self) -> Result<(), ToolError> {
        let sent = writeln!(self.stdin, "-stay_open\nFalse").and_then(|_| self.stdin.flush());
        drop(self.stdin);
        if let Err(e) = sent {
            warn!(error = %e, "Could not ask exiftool to exit");
            let _ = self.child.kill();
        }
        self.child
            .wait()
            .map(|_| ())
            .map_err(|e| ToolError::Protocol(format!("waiting for exiftool: {}", e)))
    }

    fn kill(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn broken_pipe(e: std::io::Error) -> ToolError {
    ToolError::Protocol(e.to_string())
}
