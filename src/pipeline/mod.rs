//! Pipeline coordinator split into focused submodules.
//!
//! The [`Pipeline`] struct wires the metadata parser, resolver pool and download
//! queue together. Its methods are organized by domain:
//! - [`parse`] - URL submission and parse cancellation
//! - [`tasks`] - Committing, removing and clearing download tasks
//! - [`control`] - Queue control (start/pause/resume/stop) and status queries
//! - [`dispatcher`] - Component event handling and counter bookkeeping
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod dispatcher;
mod lifecycle;
mod parse;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests;

use crate::config::Config;
use crate::error::Result;
use crate::history::{HistorySink, NoOpHistorySink};
use crate::parser::StreamingUrlParser;
use crate::queue::DownloadQueue;
use crate::resolve::ResolvePool;
use crate::types::{Event, ParseStats};
use crate::ytdlp::YtDlp;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Counters and flags owned by the coordinator
#[derive(Debug, Default)]
pub(crate) struct CoordinatorState {
    /// Save path of the most recent `parse_url` call
    pub(crate) current_save_path: Option<PathBuf>,
    /// Parse counters for the most recent `parse_url` call
    pub(crate) parse: ParseStats,
    /// `start` was called and the queue has not drained or been stopped since
    pub(crate) is_running: bool,
    /// `pause` was called while running
    pub(crate) is_paused: bool,
    /// Runtime concurrency limit
    pub(crate) max_concurrent: usize,
    /// Tasks committed to the queue
    pub(crate) download_total: u64,
    /// Terminal downloads
    pub(crate) download_done: u64,
    pub(crate) download_succeeded: u64,
    pub(crate) download_failed: u64,
    pub(crate) download_canceled: u64,
}

/// Parser, resolver and download queue behind one control surface
///
/// Cloneable: all fields are Arc-wrapped. All component events are handled by
/// one dispatcher task, so counters are only ever updated from one place.
///
/// Dropping the last handle stops the dispatcher. Running downloads and resolve
/// jobs are not killed on drop; call [`shutdown`](Self::shutdown) for that.
#[derive(Clone)]
pub struct Pipeline {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Located yt-dlp shared by all components
    pub(crate) tool: Arc<YtDlp>,
    pub(crate) parser: StreamingUrlParser,
    pub(crate) resolver: ResolvePool,
    pub(crate) queue: DownloadQueue,
    pub(crate) state: Arc<Mutex<CoordinatorState>>,
    /// Receives a snapshot of every finished download
    pub(crate) history: Arc<dyn HistorySink>,
    /// Set to false during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops the dispatcher
    pub(crate) shutdown_token: CancellationToken,
    pub(crate) dispatcher: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Cancels `shutdown_token` once the last caller-held handle is dropped
    ///
    /// `None` in the dispatcher's own copy, which must not keep itself alive.
    pub(crate) drop_guard: Option<Arc<DropGuard>>,
}

impl Pipeline {
    /// Create a pipeline that discards history records
    ///
    /// Must be called from within a tokio runtime; the event dispatcher is spawned here.
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_history_sink(config, Arc::new(NoOpHistorySink)).await
    }

    /// Create a pipeline that hands every finished download to `history`
    pub async fn with_history_sink(config: Config, history: Arc<dyn HistorySink>) -> Result<Self> {
        config.validate()?;

        let tool = Arc::new(YtDlp::from_config(&config));
        let (event_tx, _rx) = broadcast::channel(config.event_channel_capacity);

        let (parser_tx, parser_rx) = mpsc::unbounded_channel();
        let (resolve_tx, resolve_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let parser = StreamingUrlParser::new(Arc::clone(&tool), parser_tx);
        let resolver = ResolvePool::new(Arc::clone(&tool), config.resolve.max_threads, resolve_tx);
        let queue = DownloadQueue::new(
            Arc::clone(&tool),
            config.download.max_concurrent_downloads,
            queue_tx,
        );

        let state = CoordinatorState {
            max_concurrent: config.download.max_concurrent_downloads,
            ..Default::default()
        };

        tracing::info!(
            resolve_threads = config.resolve.max_threads,
            max_concurrent = config.download.max_concurrent_downloads,
            history = history.name(),
            "Pipeline created"
        );

        let shutdown_token = CancellationToken::new();
        let pipeline = Self {
            config: Arc::new(config),
            event_tx,
            tool,
            parser,
            resolver,
            queue,
            state: Arc::new(Mutex::new(state)),
            history,
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: shutdown_token.clone(),
            dispatcher: Arc::new(Mutex::new(None)),
            drop_guard: Some(Arc::new(shutdown_token.drop_guard())),
        };

        let handle = tokio::spawn(dispatcher::run(
            Self {
                drop_guard: None,
                ..pipeline.clone()
            },
            parser_rx,
            resolve_rx,
            queue_rx,
        ));
        *pipeline.dispatcher.lock().await = Some(handle);

        Ok(pipeline)
    }

    /// Subscribe to pipeline events
    ///
    /// Events emitted before the call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Version string reported by the located yt-dlp
    pub async fn tool_version(&self) -> Result<String> {
        self.tool.version().await
    }

    /// The pipeline configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send an event to all subscribers (no subscribers is fine)
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
