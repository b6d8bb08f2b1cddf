//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::time::Duration;

use super::Pipeline;

/// How long shutdown waits for killed downloads to report back
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

impl Pipeline {
    /// Shut the pipeline down
    ///
    /// 1. Stops accepting new work
    /// 2. Cancels the running parse and all resolver jobs
    /// 3. Stops the download queue, killing running downloads
    /// 4. Waits (bounded) for those downloads to report back, so they reach history
    /// 5. Stops the event dispatcher and emits [`Event::Shutdown`]
    ///
    /// Calling it again is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating pipeline shutdown");

        // 1. Stop accepting new work
        self.accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);

        // 2. Cancel parse and resolve work
        self.parser.cancel().await;
        let dropped = self.resolver.cancel_all().await;
        if dropped > 0 {
            tracing::info!(dropped, "Dropped queued resolve jobs");
        }

        // 3. Stop the queue
        {
            let mut state = self.state.lock().await;
            state.is_running = false;
            state.is_paused = false;
            self.queue.stop_queue().await;
        }

        // 4. Wait for killed downloads to finish
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_running_downloads()).await {
            Ok(()) => tracing::info!("All running downloads stopped"),
            Err(_) => tracing::warn!("Timeout waiting for downloads to stop, proceeding with shutdown"),
        }

        // 5. Stop the dispatcher once it has drained what was reported
        self.shutdown_token.cancel();
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Event dispatcher ended abnormally");
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Pipeline shutdown complete");
        Ok(())
    }

    async fn wait_for_running_downloads(&self) {
        loop {
            let running = self.queue.stats().await.running;
            if running == 0 {
                return;
            }
            tracing::debug!(running, "Waiting for downloads to stop");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
