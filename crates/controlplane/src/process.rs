//! Subprocess execution with a bounded deadline.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for output after a killed child
///
/// A grandchild that inherited the pipes can keep them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, -1 when terminated by a signal
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `program` with `args`, killing it once `timeout` has elapsed.
///
/// Output is drained on background threads so a chatty child cannot block
/// on a full pipe while we poll for its exit. Waiting for that output is
/// bounded too: pipes still held open by a grandchild are abandoned.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    log::debug!("Running: {} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::ToolNotFound {
                tool: program.to_string(),
            },
            _ => Error::Io(e),
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let start = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            let limit = timeout.saturating_sub(start.elapsed()).max(DRAIN_GRACE);
            return Ok(CommandOutput {
                stdout: collect(stdout, limit),
                stderr: collect(stderr, limit),
                exit_code: status.code().unwrap_or(-1),
            });
        }

        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            let _ = collect(stdout, DRAIN_GRACE);
            let _ = collect(stderr, DRAIN_GRACE);
            return Err(Error::Timeout {
                command: format!("{program} {}", args.join(" ")),
                seconds: timeout.as_secs(),
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe to the end on a background thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = String::new();
        let _ = pipe.read_to_string(&mut buffer);
        let _ = tx.send(buffer);
    });
    rx
}

/// Output of a drained pipe, waiting at most `limit`.
///
/// A reader still blocked after `limit` is detached, not joined.
fn collect(pipe: Option<Receiver<String>>, limit: Duration) -> String {
    pipe.and_then(|rx| rx.recv_timeout(limit).ok()).unwrap_or_default()
}

/// Run a command and return its stdout, classifying a failure from stderr.
pub fn run_checked(
    program: &str,
    args: &[&str],
    timeout: Duration,
    subject: Option<&str>,
) -> Result<String> {
    let output = run_with_timeout(program, args, timeout)?;

    if !output.success() {
        let detail = if output.stderr.trim().is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        return Err(Error::from_cli_output(program, detail, subject));
    }

    Ok(output.stdout)
}

/// Resolve `program` on PATH, or as a path when it names one.
pub fn require_tool(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| Error::ToolNotFound {
        tool: program.to_string(),
    })
}
