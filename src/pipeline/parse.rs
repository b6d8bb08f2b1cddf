//! URL submission and parse cancellation.

use crate::error::{Error, Result};
use crate::types::{Event, ParseStats};
use std::path::Path;
use std::sync::atomic::Ordering;

use super::Pipeline;

impl Pipeline {
    /// Start streaming metadata for `url`; entries are saved under `save_path`
    ///
    /// Returns once the metadata tool has been started. Parse counters are reset.
    /// Validation failures are returned and also emitted as [`Event::TaskError`]
    /// without an ID.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` is empty or not http(s)
    /// - [`Error::InvalidSavePath`] if `save_path` is empty
    /// - [`Error::AlreadyRunning`] if a parse was in progress (it has been canceled)
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    pub async fn parse_url(&self, url: &str, save_path: impl AsRef<Path>) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let save_path = save_path.as_ref();
        if url.trim().is_empty() {
            return Err(self.reject(Error::InvalidUrl("URL is empty".to_string())));
        }
        if save_path.as_os_str().is_empty() {
            return Err(self.reject(Error::InvalidSavePath));
        }

        {
            let mut state = self.state.lock().await;
            state.current_save_path = Some(save_path.to_path_buf());
            state.parse = ParseStats::default();
        }
        self.emit_parse_stats(ParseStats::default());

        match self.parser.parse(url).await {
            Ok(()) => {
                tracing::info!(url = %url.trim(), save_path = %save_path.display(), "Parse submitted");
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Cancel the in-flight parse; returns whether one was running
    ///
    /// Entries already handed to the resolver pool are not affected.
    pub async fn cancel_parse(&self) -> bool {
        let canceled = self.parser.cancel().await;
        if canceled {
            self.emit_event(Event::Log {
                message: "Parse canceled".to_string(),
            });
        }
        canceled
    }

    /// Whether a parse run is in progress
    pub async fn is_parsing(&self) -> bool {
        self.parser.is_running().await
    }

    /// Current parse counters
    pub async fn parse_stats(&self) -> ParseStats {
        self.state.lock().await.parse
    }

    pub(crate) fn emit_parse_stats(&self, stats: ParseStats) {
        self.emit_event(Event::ParseStatsUpdated {
            total: stats.total,
            success: stats.success,
            failed: stats.failed,
        });
    }

    /// Report a submission error to subscribers and hand it back
    fn reject(&self, error: Error) -> Error {
        tracing::warn!(error = %error, "Parse request rejected");
        self.emit_event(Event::TaskError {
            id: None,
            message: error.to_string(),
            code: error.error_code().to_string(),
        });
        error
    }
}
