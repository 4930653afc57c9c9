//! Progress fan-out for apply sessions
//!
//! Events go to a broadcast channel (any number of subscribers) and to an
//! optional callback. Within one session the reported percentage never
//! decreases and exactly one terminal event is sent.

use super::types::{UpdateProgress, UpdateStatus};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Progress callback type
pub type UpdateProgressCallback = Arc<dyn Fn(UpdateProgress) + Send + Sync>;

/// Capacity of the progress broadcast channel, above the event count of one session
pub const PROGRESS_CHANNEL_CAPACITY: usize = 128;

/// Share of the scale covered by the download phase
pub const DOWNLOAD_SHARE: u8 = 90;

/// Map a download percentage onto the session scale (`0..=DOWNLOAD_SHARE`)
pub fn scale_download_percent(percent: u8) -> u8 {
    (percent.min(100) as u16 * DOWNLOAD_SHARE as u16 / 100) as u8
}

/// Per-session reporter enforcing ordering rules
pub struct ProgressReporter {
    sender: broadcast::Sender<UpdateProgress>,
    callback: Option<UpdateProgressCallback>,
    last: Option<(UpdateStatus, u8)>,
    finished: bool,
}

impl ProgressReporter {
    pub fn new(
        sender: broadcast::Sender<UpdateProgress>,
        callback: Option<UpdateProgressCallback>,
    ) -> Self {
        Self {
            sender,
            callback,
            last: None,
            finished: false,
        }
    }

    /// Last percentage sent in this session
    pub fn current_percent(&self) -> u8 {
        self.last.map(|(_, pct)| pct).unwrap_or(0)
    }

    /// Send a non-terminal event
    ///
    /// Percentages below the last one are raised to it. Nothing is sent when
    /// neither status nor percentage changed, or after the terminal event.
    pub fn report(&mut self, status: UpdateStatus, percent: u8, message: impl Into<String>) {
        if self.finished || status.is_terminal() {
            return;
        }

        let percent = percent.min(100).max(self.current_percent());
        if let Some((last_status, last_pct)) = self.last {
            if last_status == status && last_pct == percent {
                return;
            }
        }

        self.send(UpdateProgress::new(status, percent, message));
    }

    /// Terminal success at 100%
    pub fn ready(&mut self, message: impl Into<String>) -> UpdateProgress {
        self.finish(UpdateProgress::ready(message))
    }

    /// Terminal failure at the last reported percentage
    pub fn failed(&mut self, message: impl Into<String>) -> UpdateProgress {
        let progress = UpdateProgress::failed(self.current_percent(), message);
        self.finish(progress)
    }

    fn finish(&mut self, progress: UpdateProgress) -> UpdateProgress {
        if !self.finished {
            self.send(progress.clone());
            self.finished = true;
        }
        progress
    }

    fn send(&mut self, progress: UpdateProgress) {
        self.last = Some((progress.status, progress.progress));

        if let Some(callback) = &self.callback {
            callback(progress.clone());
        }
        // No receivers is not an error
        let _ = self.sender.send(progress);
    }
}
