//! Streaming metadata parser
//!
//! Runs the metadata dump for one URL and turns its stdout into [`ParsedEntry`]
//! records as lines arrive, so the first entry of a long playlist is available
//! long before the dump finishes. One run at a time per parser.

mod decode;

pub use decode::OutputDecoder;

use crate::error::{Error, Result};
use crate::process::{ProcessEvent, ProcessExit, ProcessKiller, RunningProcess};
use crate::types::ParsedEntry;
use crate::ytdlp::YtDlp;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Notifications from a parse run
///
/// Per run: zero or more `Entry`/`Log`, then exactly one of `Finished`, `Failed`
/// or `Canceled`.
#[derive(Debug)]
pub enum ParserEvent {
    /// A record was decoded
    Entry(ParsedEntry),
    /// Informational line (tool stderr, progress notes)
    Log(String),
    /// Tool exited successfully and produced at least one entry
    Finished {
        /// Entries emitted during the run
        entries: usize,
        /// Stdout lines that could not be decoded
        skipped_lines: usize,
    },
    /// The run failed as a whole
    Failed(Error),
    /// The run was canceled; nothing else follows for it
    Canceled,
}

struct ActiveRun {
    run_id: u64,
    killer: ProcessKiller,
}

/// Streams metadata records for a URL
#[derive(Clone)]
pub struct StreamingUrlParser {
    tool: Arc<YtDlp>,
    event_tx: mpsc::UnboundedSender<ParserEvent>,
    active: Arc<Mutex<Option<ActiveRun>>>,
    next_run_id: Arc<AtomicU64>,
}

impl StreamingUrlParser {
    /// Create a parser that reports on `event_tx`
    pub fn new(tool: Arc<YtDlp>, event_tx: mpsc::UnboundedSender<ParserEvent>) -> Self {
        Self {
            tool,
            event_tx,
            active: Arc::new(Mutex::new(None)),
            next_run_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Start a metadata dump for `url`
    ///
    /// Returns once the run has been started. If a run is already active it is
    /// canceled and [`Error::AlreadyRunning`] is returned; the caller submits again.
    pub async fn parse(&self, url: &str) -> Result<()> {
        let url = validate_url(url)?;

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            tracing::warn!(run_id = previous.run_id, "Parser already running, canceling previous run");
            previous.killer.kill();
            return Err(Error::AlreadyRunning);
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let process = self.tool.runner().start(self.tool.dump_args(&url));
        *active = Some(ActiveRun {
            run_id,
            killer: process.killer(),
        });
        drop(active);

        tracing::info!(run_id, %url, "Metadata dump started");
        self.event_tx
            .send(ParserEvent::Log(format!("Fetching metadata for {url}")))
            .ok();

        tokio::spawn(drive_run(
            run_id,
            process,
            Arc::clone(&self.active),
            self.event_tx.clone(),
        ));
        Ok(())
    }

    /// Kill the active run, if any; returns whether one was running
    pub async fn cancel(&self) -> bool {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(run) => {
                run.killer.kill();
                tracing::info!(run_id = run.run_id, "Metadata dump canceled");
                true
            }
            None => false,
        }
    }

    /// Whether a run is in progress
    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }
}

/// Accept only absolute http(s) URLs
pub fn validate_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("URL is empty".to_string()));
    }
    let parsed =
        url::Url::parse(trimmed).map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        scheme => Err(Error::InvalidUrl(format!(
            "{trimmed}: unsupported scheme '{scheme}'"
        ))),
    }
}

async fn drive_run(
    run_id: u64,
    mut process: RunningProcess,
    active: Arc<Mutex<Option<ActiveRun>>>,
    tx: mpsc::UnboundedSender<ParserEvent>,
) {
    let killer = process.killer();
    let mut decoder = OutputDecoder::new();
    let mut stderr = Vec::new();
    let mut exit = ProcessExit::Crashed { signal: None };

    while let Some(event) = process.next_event().await {
        match event {
            ProcessEvent::Stdout(line) => {
                for entry in decoder.push_line(&line) {
                    if killer.is_killed() {
                        break;
                    }
                    tx.send(ParserEvent::Entry(entry)).ok();
                }
            }
            ProcessEvent::Stderr(line) => {
                if !line.trim().is_empty() && !killer.is_killed() {
                    tx.send(ParserEvent::Log(line.clone())).ok();
                }
                stderr.push(line);
            }
            ProcessEvent::Exited(e) => exit = e,
        }
    }

    // a canceled or superseded run has already been removed from `active`
    let still_current = {
        let mut active = active.lock().await;
        match active.as_ref() {
            Some(run) if run.run_id == run_id => {
                *active = None;
                true
            }
            _ => false,
        }
    };

    if !still_current || killer.is_killed() {
        tracing::debug!(run_id, "Parse run ended after cancellation");
        tx.send(ParserEvent::Canceled).ok();
        return;
    }

    let stderr = stderr.join("\n");
    let outcome = match exit.into_error(process.program(), &stderr) {
        Some(e) => ParserEvent::Failed(Error::Process(e)),
        None => {
            for entry in decoder.finish() {
                tx.send(ParserEvent::Entry(entry)).ok();
            }
            if decoder.emitted() > 0 {
                ParserEvent::Finished {
                    entries: decoder.emitted(),
                    skipped_lines: decoder.skipped_lines(),
                }
            } else if decoder.saw_output() {
                ParserEvent::Failed(Error::Decode(format!(
                    "no decodable records in metadata output ({} malformed lines)",
                    decoder.skipped_lines()
                )))
            } else {
                ParserEvent::Failed(Error::NoOutput { stderr })
            }
        }
    };

    match &outcome {
        ParserEvent::Finished {
            entries,
            skipped_lines,
        } => tracing::info!(run_id, entries, skipped_lines, "Metadata dump finished"),
        ParserEvent::Failed(e) => tracing::warn!(run_id, error = %e, "Metadata dump failed"),
        _ => {}
    }
    tx.send(outcome).ok();
}
