// src/process.rs

//! Subprocess invocation for installers, compilers and the host CLI
//!
//! Every external command goes through [`CommandRunner`] so tests can swap
//! in a scripted fake. [`SystemRunner`] resolves the program on `PATH`,
//! nulls stdin, captures output and enforces a deadline.

use crate::error::{Error, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Output with exit code 0 and the given stdout
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Output with a non-zero exit code and the given stderr
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Short description of a failure for error messages
    pub fn describe_failure(&self) -> String {
        let code = self
            .code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        let detail = self.stderr.trim();
        if detail.is_empty() {
            format!("exit code {code}")
        } else {
            format!("exit code {code}: {detail}")
        }
    }
}

/// Runs external programs
///
/// A missing program is [`Error::ToolNotFound`] and an expired deadline is
/// [`Error::Timeout`]. A non-zero exit is *not* an error at this level; the
/// caller inspects [`CommandOutput::code`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput>;
}

/// [`CommandRunner`] spawning real processes
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput> {
        let resolved =
            which::which(program).map_err(|_| Error::ToolNotFound(program.to_string()))?;
        debug!("Executing: {} {:?}", resolved.display(), args);

        let mut command = Command::new(&resolved);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::IoError(format!("Failed to spawn '{program}': {e}")))?;

        // Pipes are drained while waiting so a chatty installer cannot block
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Timeout {
                    command: format!("{program} {}", args.join(" ")).trim().to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&stdout.join().unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned();

        for line in stdout.lines() {
            debug!("[{}] {}", program, line);
        }
        for line in stderr.lines() {
            warn!("[{}] {}", program, line);
        }

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}
