//! Error types for video-dl
//!
//! This module provides error handling for the pipeline, including:
//! - The crate-wide [`Error`] type and [`Result`] alias
//! - [`ProcessError`] for external tool outcomes (launch, crash, exit code, timeout)
//! - Machine-readable error codes for callers that surface errors to users

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for video-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for video-dl
///
/// Each variant carries enough context to be shown to a user or attached to the
/// smallest affected unit of work (one entry or one task).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.max_concurrent_downloads")
        key: Option<String>,
    },

    /// External process failed to launch, crashed, or exited unsuccessfully
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// Tool output could not be decoded into a record
    #[error("decode error: {0}")]
    Decode(String),

    /// The metadata tool finished without producing a single record
    #[error("no output from metadata tool{}", format_stderr(.stderr))]
    NoOutput {
        /// Anything the tool printed on stderr
        stderr: String,
    },

    /// A parse run is already in progress (the previous run has been canceled)
    #[error("parser is already running")]
    AlreadyRunning,

    /// Submitted URL is empty or not http(s)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Submitted save path is empty
    #[error("save path is empty")]
    InvalidSavePath,

    /// Task not found in the pending queue
    #[error("task not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// External process outcomes that count as failures
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Executable could not be found or started
    #[error("failed to launch {program}: {reason}")]
    LaunchFailed {
        /// Program that was invoked
        program: PathBuf,
        /// OS-level reason
        reason: String,
    },

    /// Process was terminated by a signal it did not ask for
    #[error("process crashed{}{}", format_signal(.signal), format_stderr(.stderr))]
    Crashed {
        /// Terminating signal, when the platform reports one
        signal: Option<i32>,
        /// Captured stderr text
        stderr: String,
    },

    /// Process exited on its own with a non-zero code
    #[error("process exited with code {code}{}", format_stderr(.stderr))]
    ExitedNonZero {
        /// Exit code
        code: i32,
        /// Captured stderr text
        stderr: String,
    },

    /// Process exceeded the configured timeout and was killed
    #[error("process timed out after {after:?}")]
    TimedOut {
        /// The configured limit
        after: Duration,
    },

    /// Process was killed on request (pause, stop, cancel)
    #[error("process was killed")]
    Killed,
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

fn format_signal(signal: &Option<i32>) -> String {
    match signal {
        Some(sig) => format!(" (signal {})", sig),
        None => String::new(),
    }
}

impl Error {
    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Process(e) => e.error_code(),
            Error::Decode(_) => "decode_error",
            Error::NoOutput { .. } => "no_output",
            Error::AlreadyRunning => "already_running",
            Error::InvalidUrl(_) => "invalid_url",
            Error::InvalidSavePath => "invalid_save_path",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether this error was caused by an explicit kill request
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Process(ProcessError::Killed))
    }
}

impl ProcessError {
    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ProcessError::LaunchFailed { .. } => "launch_failed",
            ProcessError::Crashed { .. } => "process_crashed",
            ProcessError::ExitedNonZero { .. } => "process_exited_non_zero",
            ProcessError::TimedOut { .. } => "process_timed_out",
            ProcessError::Killed => "process_killed",
        }
    }
}
