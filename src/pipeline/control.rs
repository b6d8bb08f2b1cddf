//! Download queue control (start/pause/resume/stop) and status queries.

use crate::error::{Error, Result};
use crate::types::{DownloadStats, Event, QueueState};
use std::sync::atomic::Ordering;

use super::Pipeline;

impl Pipeline {
    /// Start draining the download queue
    ///
    /// A no-op (with a warning) when already running or when nothing is queued.
    pub async fn start(&self) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let mut state = self.state.lock().await;
        if self.queue.state().await != QueueState::Stopped {
            tracing::warn!("Download already running");
            return Ok(());
        }

        let stats = self.queue.stats().await;
        if stats.pending == 0 {
            tracing::warn!("No tasks to download");
            drop(state);
            self.emit_event(Event::Log {
                message: "No tasks to download".to_string(),
            });
            return Ok(());
        }

        self.queue.set_max_concurrent(state.max_concurrent).await?;
        state.is_running = true;
        state.is_paused = false;
        self.queue.start_queue().await;
        drop(state);

        tracing::info!(pending = stats.pending, "Download started");
        self.emit_event(Event::Log {
            message: format!("Download started: {} tasks", stats.pending),
        });
        Ok(())
    }

    /// Pause downloading; running downloads are killed and finish as canceled
    ///
    /// Idempotent: pausing while paused or stopped does nothing.
    pub async fn pause(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !self.queue.pause_queue().await {
            tracing::debug!(
                running = state.is_running,
                paused = state.is_paused,
                "Pause ignored"
            );
            return Ok(());
        }

        state.is_running = true;
        state.is_paused = true;
        tracing::info!("Download paused");
        self.emit_event(Event::QueuePaused);
        Ok(())
    }

    /// Resume after [`pause`](Self::pause)
    ///
    /// Idempotent: resuming while not paused does nothing.
    pub async fn resume(&self) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let mut state = self.state.lock().await;
        if self.queue.state().await != QueueState::Paused {
            tracing::debug!(
                running = state.is_running,
                paused = state.is_paused,
                "Resume ignored"
            );
            return Ok(());
        }

        state.is_running = true;
        state.is_paused = false;
        self.queue.start_queue().await;
        tracing::info!("Download resumed");
        self.emit_event(Event::QueueResumed);
        Ok(())
    }

    /// Stop downloading; running downloads are killed, pending tasks stay queued
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if self.queue.state().await == QueueState::Stopped {
            tracing::debug!("Stop ignored, not running");
            state.is_running = false;
            state.is_paused = false;
            return Ok(());
        }

        state.is_running = false;
        state.is_paused = false;
        self.queue.stop_queue().await;
        tracing::info!("Download stopped");
        self.emit_event(Event::QueueStopped);
        Ok(())
    }

    /// Change the download concurrency limit
    ///
    /// Takes effect the next time a slot is filled; running downloads are not killed.
    pub async fn set_max_concurrent(&self, max_concurrent: usize) -> Result<()> {
        let mut state = self.state.lock().await;
        self.queue.set_max_concurrent(max_concurrent).await?;
        state.max_concurrent = max_concurrent;
        tracing::info!(max_concurrent, "Download concurrency updated");
        Ok(())
    }

    /// Whether downloading has been started and has not drained or stopped
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running
    }

    /// Whether downloading is paused
    pub async fn is_paused(&self) -> bool {
        self.state.lock().await.is_paused
    }

    /// Download queue state
    pub async fn queue_state(&self) -> QueueState {
        self.queue.state().await
    }

    /// Current download counters
    pub async fn download_stats(&self) -> DownloadStats {
        let state = self.state.lock().await;
        let queue = self.queue.stats().await;
        DownloadStats {
            total: state.download_total,
            done: state.download_done,
            succeeded: state.download_succeeded,
            failed: state.download_failed,
            canceled: state.download_canceled,
            pending: queue.pending,
            running: queue.running,
        }
    }

    /// done / (done + pending + running), 0.0 when idle
    pub async fn progress(&self) -> f32 {
        self.download_stats().await.progress()
    }

    pub(crate) async fn emit_progress(&self) {
        let progress = self.progress().await;
        self.emit_event(Event::ProgressUpdated { progress });
    }
}
