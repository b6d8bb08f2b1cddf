//! # video-dl
//!
//! Bulk video download orchestration on top of `yt-dlp`.
//!
//! A submitted URL (single video, playlist or channel) flows through three stages:
//!
//! 1. **Parse** - the metadata dump is streamed and decoded line by line, so the
//!    first entries are available before a long playlist has been fully listed
//! 2. **Resolve** - a bounded pool fetches the detail record of each entry and
//!    picks the download format
//! 3. **Download** - a FIFO queue runs at most N downloads at once, with
//!    pause/resume/stop and per-task completion reporting
//!
//! [`Pipeline`] ties the stages together, keeps the counters and is the only type
//! most callers need.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Failures stay local** - A failed entry or download never stops the others
//! - **Sensible defaults** - `Config::default()` finds `yt-dlp` on PATH and works
//!
//! ## Quick Start
//!
//! ```no_run
//! use video_dl::{Config, Event, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.auto_enqueue = true;
//!
//!     let pipeline = Pipeline::new(config).await?;
//!     let mut events = pipeline.subscribe();
//!
//!     pipeline
//!         .parse_url("https://www.youtube.com/playlist?list=PL123", "./videos")
//!         .await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             Event::TaskQueued { .. } if !pipeline.is_running().await => {
//!                 pipeline.start().await?
//!             }
//!             Event::AllTasksFinished => break,
//!             other => println!("{other:?}"),
//!         }
//!     }
//!
//!     pipeline.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Finished-download history hand-off
pub mod history;
/// yt-dlp JSON records and format selection
pub mod metadata;
/// Streaming metadata parser
pub mod parser;
/// Pipeline coordinator (decomposed into focused submodules)
pub mod pipeline;
/// Supervised external process invocation
pub mod process;
/// Concurrency-limited download queue
pub mod queue;
/// Bounded resolver pool
pub mod resolve;
/// Core types and events
pub mod types;
/// yt-dlp discovery and argument construction
pub mod ytdlp;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, DumpMode, ParserConfig, ResolveConfig, ToolsConfig};
pub use error::{Error, ProcessError, Result};
pub use history::{HistorySink, MemoryHistorySink, NoOpHistorySink};
pub use pipeline::Pipeline;
pub use process::{ProcessEvent, ProcessExit, ProcessKiller, ProcessRunner, RunningProcess};
pub use types::{
    DownloadStats, DownloadTask, EntryKind, Event, HistoryRecord, HistoryStatus, ParseStats,
    ParsedEntry, QueueState,
};
pub use ytdlp::YtDlp;

/// Run the pipeline until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if the
///   handlers cannot be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use video_dl::{Config, Pipeline, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = Pipeline::new(Config::default()).await?;
///     pipeline
///         .parse_url("https://vimeo.com/123456", "./videos")
///         .await?;
///
///     run_with_shutdown(pipeline).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(pipeline: Pipeline) -> Result<()> {
    wait_for_signal().await;
    pipeline.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
