//! Bounded pool that turns parsed entries into download tasks
//!
//! Each job runs a single-record detail dump for one entry and picks the download
//! format from it. At most `max_threads` jobs run at once; the rest wait in FIFO
//! order and start as soon as a slot frees up.

use crate::error::{Error, Result};
use crate::metadata::VideoInfo;
use crate::process::{ProcessKiller, RunningProcess};
use crate::types::{DownloadTask, ParsedEntry};
use crate::ytdlp::YtDlp;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Outcome of one resolve job
#[derive(Debug)]
pub enum ResolveEvent {
    /// The entry was resolved into a task
    Resolved(DownloadTask),
    /// The entry could not be resolved
    Failed {
        /// The entry that was submitted
        entry: ParsedEntry,
        /// Why it failed
        error: Error,
    },
}

/// Pool counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Jobs waiting for a slot
    pub queued: usize,
    /// Jobs currently running
    pub running: usize,
    /// Highest `running` ever observed
    pub peak_running: usize,
    /// Jobs ever submitted
    pub submitted: u64,
    /// Jobs that produced a task
    pub resolved: u64,
    /// Jobs that failed (including canceled ones)
    pub failed: u64,
}

struct ResolveJob {
    entry: ParsedEntry,
    save_path: PathBuf,
}

#[derive(Default)]
struct PoolInner {
    queue: VecDeque<ResolveJob>,
    running: HashMap<u64, ProcessKiller>,
    next_job_id: u64,
    stats: ResolveStats,
}

/// Fixed-size resolver pool
#[derive(Clone)]
pub struct ResolvePool {
    tool: Arc<YtDlp>,
    max_threads: usize,
    inner: Arc<Mutex<PoolInner>>,
    event_tx: mpsc::UnboundedSender<ResolveEvent>,
}

impl ResolvePool {
    /// Create a pool running at most `max_threads` jobs at once (minimum 1)
    pub fn new(
        tool: Arc<YtDlp>,
        max_threads: usize,
        event_tx: mpsc::UnboundedSender<ResolveEvent>,
    ) -> Self {
        Self {
            tool,
            max_threads: max_threads.max(1),
            inner: Arc::new(Mutex::new(PoolInner::default())),
            event_tx,
        }
    }

    /// Configured concurrency limit
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Queue an entry; it starts immediately if a slot is free
    pub async fn add_task(&self, entry: ParsedEntry, save_path: PathBuf) {
        let mut inner = self.inner.lock().await;
        tracing::debug!(entry_id = %entry.id, queued = inner.queue.len(), "Resolve job submitted");
        inner.queue.push_back(ResolveJob { entry, save_path });
        inner.stats.submitted += 1;
        self.fill_slots(&mut inner);
    }

    /// Drop queued jobs and kill running ones; returns the number of dropped jobs
    ///
    /// Killed jobs still report [`ResolveEvent::Failed`].
    pub async fn cancel_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let dropped = inner.queue.len();
        inner.queue.clear();
        for killer in inner.running.values() {
            killer.kill();
        }
        if dropped > 0 || !inner.running.is_empty() {
            tracing::info!(dropped, running = inner.running.len(), "Resolve pool canceled");
        }
        dropped
    }

    /// Snapshot of the pool counters
    pub async fn stats(&self) -> ResolveStats {
        let inner = self.inner.lock().await;
        ResolveStats {
            queued: inner.queue.len(),
            running: inner.running.len(),
            ..inner.stats
        }
    }

    fn fill_slots(&self, inner: &mut PoolInner) {
        while inner.running.len() < self.max_threads {
            let Some(job) = inner.queue.pop_front() else {
                break;
            };

            let job_id = inner.next_job_id;
            inner.next_job_id += 1;

            let launch = job_url(&job.entry)
                .map(|url| self.tool.runner().start(self.tool.resolve_args(url)));
            let killer = match &launch {
                Ok(process) => process.killer(),
                Err(_) => ProcessKiller::default(),
            };
            inner.running.insert(job_id, killer);
            inner.stats.peak_running = inner.stats.peak_running.max(inner.running.len());

            let pool = self.clone();
            tokio::spawn(async move {
                let result = match launch {
                    Ok(process) => resolve_job(process, &job).await,
                    Err(e) => Err(e),
                };
                pool.on_job_finished(job_id, job.entry, result).await;
            });
        }
    }

    async fn on_job_finished(&self, job_id: u64, entry: ParsedEntry, result: Result<DownloadTask>) {
        let mut inner = self.inner.lock().await;
        inner.running.remove(&job_id);

        match result {
            Ok(task) => {
                inner.stats.resolved += 1;
                tracing::debug!(id = %task.id, format = %task.format_id, "Entry resolved");
                self.event_tx.send(ResolveEvent::Resolved(task)).ok();
            }
            Err(error) => {
                inner.stats.failed += 1;
                tracing::warn!(entry_id = %entry.id, error = %error, "Entry resolve failed");
                self.event_tx
                    .send(ResolveEvent::Failed { entry, error })
                    .ok();
            }
        }

        self.fill_slots(&mut inner);
    }
}

fn job_url(entry: &ParsedEntry) -> Result<&str> {
    let url = entry.source_url.trim();
    if url.is_empty() {
        return Err(Error::InvalidUrl(format!("entry '{}' has no source URL", entry.id)));
    }
    Ok(url)
}

async fn resolve_job(process: RunningProcess, job: &ResolveJob) -> Result<DownloadTask> {
    let stdout = process.collect().await.into_stdout()?;

    let value: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| Error::Decode(format!("JSON parse error: {e}")))?;
    if !value.is_object() {
        return Err(Error::Decode(
            "invalid JSON from yt-dlp: expected a single object".to_string(),
        ));
    }

    let info = VideoInfo::from_value(value)?;
    Ok(build_task(&job.entry, &info, &job.save_path))
}

/// Combine the parsed entry with its detail record
fn build_task(entry: &ParsedEntry, info: &VideoInfo, save_path: &Path) -> DownloadTask {
    let mut choice = info.choose_format();
    if choice.format_id.is_empty() && !entry.format_hint.is_empty() {
        choice.format_id = entry.format_hint.clone();
        if !entry.extension_hint.is_empty() {
            choice.extension = entry.extension_hint.clone();
        }
    }

    DownloadTask {
        id: entry.id.clone(),
        sequence_index: entry.sequence_index,
        total_count: entry.total_count,
        kind: entry.kind,
        title: info
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| entry.title.clone()),
        source_url: info
            .page_url()
            .map(str::to_string)
            .unwrap_or_else(|| entry.source_url.clone()),
        format_id: choice.format_id,
        extension: choice.extension,
        save_path: save_path.to_path_buf(),
        resolved_at: Utc::now(),
        started_at: None,
        ended_at: None,
        selected: false,
        finished: false,
    }
}
