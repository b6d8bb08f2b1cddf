//! Supervised external process invocation
//!
//! [`ProcessRunner::start`] returns immediately. The child is spawned, read and
//! reaped by a background task; the caller receives [`ProcessEvent`]s on a channel:
//! one per completed stdout/stderr line, then exactly one [`ProcessEvent::Exited`].
//! Killing is signalled through a [`ProcessKiller`], which is cheap to clone and
//! safe to trigger any number of times, before or after the process exits.

use crate::error::ProcessError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long to wait for the output readers after the process is gone
///
/// A killed process can leave grandchildren holding the pipes open.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How a process invocation ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exited with code 0
    Success,
    /// Exited on its own with a non-zero code
    NonZero {
        /// Exit code
        code: i32,
    },
    /// Terminated abnormally without being asked to
    Crashed {
        /// Terminating signal, when the platform reports one
        signal: Option<i32>,
    },
    /// Killed through [`ProcessKiller::kill`]
    Killed,
    /// Killed by the runner's timeout watchdog
    TimedOut {
        /// The configured limit
        after: Duration,
    },
    /// Executable could not be started at all
    LaunchFailed {
        /// OS-level reason
        reason: String,
    },
}

impl ProcessExit {
    /// Whether the process exited with code 0
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessExit::Success)
    }

    /// Convert a non-successful exit into a [`ProcessError`], attaching captured stderr
    pub fn into_error(self, program: &Path, stderr: &str) -> Option<ProcessError> {
        match self {
            ProcessExit::Success => None,
            ProcessExit::NonZero { code } => Some(ProcessError::ExitedNonZero {
                code,
                stderr: stderr.trim().to_string(),
            }),
            ProcessExit::Crashed { signal } => Some(ProcessError::Crashed {
                signal,
                stderr: stderr.trim().to_string(),
            }),
            ProcessExit::Killed => Some(ProcessError::Killed),
            ProcessExit::TimedOut { after } => Some(ProcessError::TimedOut { after }),
            ProcessExit::LaunchFailed { reason } => Some(ProcessError::LaunchFailed {
                program: program.to_path_buf(),
                reason,
            }),
        }
    }
}

/// Output or termination notice from a running process
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One complete stdout line, without the line terminator
    Stdout(String),
    /// One complete stderr line, without the line terminator
    Stderr(String),
    /// The process is gone; always the last event
    Exited(ProcessExit),
}

/// Handle used to request termination of a running process
#[derive(Clone, Debug, Default)]
pub struct ProcessKiller {
    token: CancellationToken,
}

impl ProcessKiller {
    /// Request termination (idempotent, never blocks)
    pub fn kill(&self) {
        self.token.cancel();
    }

    /// Whether termination has been requested
    pub fn is_killed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Launches one executable with a fixed argument prefix and optional timeout
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    program: PathBuf,
    base_args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Create a runner for the given program
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            timeout: None,
        }
    }

    /// Arguments placed before the per-call arguments
    pub fn with_base_args(mut self, base_args: Vec<String>) -> Self {
        self.base_args = base_args;
        self
    }

    /// Kill any invocation that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The program this runner launches
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Start the program without waiting for it
    ///
    /// Must be called from within a tokio runtime. Launch failures are not returned
    /// here; they arrive as [`ProcessExit::LaunchFailed`].
    pub fn start<I, S>(&self, args: I) -> RunningProcess
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = self
            .base_args
            .iter()
            .map(OsString::from)
            .chain(args.into_iter().map(Into::into))
            .collect();

        let (tx, rx) = mpsc::unbounded_channel();
        let killer = ProcessKiller::default();

        tokio::spawn(supervise(
            self.program.clone(),
            args,
            self.timeout,
            killer.token.clone(),
            tx,
        ));

        RunningProcess {
            program: self.program.clone(),
            events: rx,
            killer,
            exited: false,
        }
    }
}

/// A started process and its event stream
#[derive(Debug)]
pub struct RunningProcess {
    program: PathBuf,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    killer: ProcessKiller,
    exited: bool,
}

/// Everything a process printed, plus how it ended
#[derive(Clone, Debug)]
pub struct CollectedOutput {
    /// Program that was run
    pub program: PathBuf,
    /// Stdout lines joined with `\n`
    pub stdout: String,
    /// Stderr lines joined with `\n`
    pub stderr: String,
    /// Exit outcome
    pub exit: ProcessExit,
}

impl CollectedOutput {
    /// Stdout on success, otherwise the matching [`ProcessError`]
    pub fn into_stdout(self) -> Result<String, ProcessError> {
        match self.exit.into_error(&self.program, &self.stderr) {
            None => Ok(self.stdout),
            Some(e) => Err(e),
        }
    }
}

impl RunningProcess {
    /// A handle that can kill this process from anywhere
    pub fn killer(&self) -> ProcessKiller {
        self.killer.clone()
    }

    /// Request termination (idempotent)
    pub fn kill(&self) {
        self.killer.kill();
    }

    /// Program that was started
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Next line or the exit notice; `None` once the exit has been delivered
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        if self.exited {
            return None;
        }
        match self.events.recv().await {
            Some(event) => {
                if matches!(event, ProcessEvent::Exited(_)) {
                    self.exited = true;
                }
                Some(event)
            }
            None => {
                // supervisor vanished without reporting (runtime shutting down)
                self.exited = true;
                Some(ProcessEvent::Exited(ProcessExit::Crashed { signal: None }))
            }
        }
    }

    /// Wait for the process to end, gathering all of its output
    pub async fn collect(mut self) -> CollectedOutput {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit = ProcessExit::Crashed { signal: None };

        while let Some(event) = self.next_event().await {
            match event {
                ProcessEvent::Stdout(line) => stdout.push(line),
                ProcessEvent::Stderr(line) => stderr.push(line),
                ProcessEvent::Exited(e) => exit = e,
            }
        }

        CollectedOutput {
            program: self.program,
            stdout: stdout.join("\n"),
            stderr: stderr.join("\n"),
            exit,
        }
    }
}

async fn supervise(
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Option<Duration>,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<ProcessEvent>,
) {
    let mut command = Command::new(&program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(program = %program.display(), error = %e, "Failed to launch process");
            tx.send(ProcessEvent::Exited(ProcessExit::LaunchFailed {
                reason: e.to_string(),
            }))
            .ok();
            return;
        }
    };

    tracing::debug!(program = %program.display(), pid = ?child.id(), "Process started");

    let stdout_reader = child
        .stdout
        .take()
        .map(|out| spawn_line_reader(out, tx.clone(), ProcessEvent::Stdout));
    let stderr_reader = child
        .stderr
        .take()
        .map(|err| spawn_line_reader(err, tx.clone(), ProcessEvent::Stderr));

    let exit = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => classify(status),
            Err(e) => {
                tracing::warn!(program = %program.display(), error = %e, "Failed to wait for process");
                ProcessExit::Crashed { signal: None }
            }
        },
        _ = token.cancelled() => {
            terminate(&mut child, &program).await;
            ProcessExit::Killed
        }
        _ = watchdog(timeout) => {
            tracing::warn!(program = %program.display(), ?timeout, "Process timed out, killing");
            terminate(&mut child, &program).await;
            ProcessExit::TimedOut { after: timeout.unwrap_or_default() }
        }
    };

    drain(stdout_reader).await;
    drain(stderr_reader).await;

    tracing::debug!(program = %program.display(), ?exit, "Process exited");
    tx.send(ProcessEvent::Exited(exit)).ok();
}

async fn watchdog(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}

async fn terminate(child: &mut Child, program: &Path) {
    // kill() fails only when the child is already reaped
    if let Err(e) = child.kill().await {
        tracing::debug!(program = %program.display(), error = %e, "Kill on exited process");
    }
}

fn spawn_line_reader<R>(
    reader: R,
    tx: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(wrap(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Process output read failed");
                    break;
                }
            }
        }
    })
}

async fn drain(reader: Option<JoinHandle<()>>) {
    let Some(handle) = reader else {
        return;
    };
    let abort = handle.abort_handle();
    if tokio::time::timeout(READER_DRAIN_TIMEOUT, handle)
        .await
        .is_err()
    {
        abort.abort();
    }
}

fn classify(status: std::process::ExitStatus) -> ProcessExit {
    if status.success() {
        return ProcessExit::Success;
    }
    match status.code() {
        Some(code) => ProcessExit::NonZero { code },
        None => ProcessExit::Crashed {
            signal: exit_signal(&status),
        },
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
