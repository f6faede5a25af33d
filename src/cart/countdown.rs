//! The visible "cart leaves in" countdown.
//!
//! Deadlines use `tokio::time::Instant` so tests running on a paused clock see the
//! countdown advance deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::cart::surface::Surface;
use crate::cart::types::{ChannelId, MessageRef};

/// Ticks between refreshes of the visible timer text, in seconds of remaining time.
const EDIT_EVERY_SECS: u64 = 5;

/// Human-readable remaining time: `SS`, `MM:SS` or `H:MM:SS`.
pub fn format_remaining(total_secs: u64) -> String {
    let (minutes, seconds) = (total_secs / 60, total_secs % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours == 0 && minutes == 0 {
        format!("{:02}", seconds)
    } else if hours == 0 {
        format!("{:02}:{:02}", minutes, seconds)
    } else {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Remaining time until `deadline`: formatted text, whether it has passed, and the
/// seconds left (partial seconds round up).
pub fn remaining(deadline: Instant) -> (String, bool, u64) {
    let now = Instant::now();
    let left = deadline.saturating_duration_since(now);
    let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
    (format_remaining(secs), now >= deadline, secs)
}

/// Shared view of a running countdown.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    pub expires_at: Instant,
    pub done: bool,
    pub remaining_secs: u64,
    /// The timer message, once posted.
    pub message: Option<MessageRef>,
}

impl CountdownTimer {
    pub fn new(duration: Duration) -> Self {
        Self {
            expires_at: Instant::now() + duration,
            done: false,
            remaining_secs: duration.as_secs(),
            message: None,
        }
    }

    pub fn text(&self) -> String {
        format_remaining(self.remaining_secs)
    }
}

/// How a countdown run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEnd {
    Expired,
    Cancelled,
    /// The timer message could not be posted.
    Unposted,
}

/// A per-second countdown posted to a channel.
pub struct Countdown {
    surface: Arc<dyn Surface>,
    channel: ChannelId,
    title: String,
    timer: Arc<Mutex<CountdownTimer>>,
}

impl Countdown {
    pub fn new(
        surface: Arc<dyn Surface>,
        channel: ChannelId,
        title: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            surface,
            channel,
            title: title.into(),
            timer: Arc::new(Mutex::new(CountdownTimer::new(duration))),
        }
    }

    /// Handle for observers; updated on every tick.
    pub fn timer(&self) -> Arc<Mutex<CountdownTimer>> {
        Arc::clone(&self.timer)
    }

    fn line(&self, timer: &str) -> String {
        format!("⏳ [{}] {}s", self.title, timer)
    }

    fn update(&self, done: bool, secs: u64) {
        if let Ok(mut t) = self.timer.lock() {
            t.done = done;
            t.remaining_secs = secs;
        }
    }

    /// Post the timer, refresh it on every 5-second boundary and delete it when the
    /// deadline passes or `cancel` fires.
    pub async fn run(self, mut cancel: oneshot::Receiver<()>) -> CountdownEnd {
        let deadline = match self.timer.lock() {
            Ok(t) => t.expires_at,
            Err(_) => Instant::now(),
        };
        let (text, _, _) = remaining(deadline);
        let message = match self.surface.send(self.channel, &self.line(&text)).await {
            Ok(m) => m,
            Err(e) => {
                log::warn!("countdown in channel {} not posted: {}", self.channel, e);
                self.update(true, 0);
                return CountdownEnd::Unposted;
            }
        };
        if let Ok(mut t) = self.timer.lock() {
            t.message = Some(message);
        }

        let end = loop {
            let (text, done, secs) = remaining(deadline);
            self.update(done, secs);
            if done {
                break CountdownEnd::Expired;
            }
            if secs % EDIT_EVERY_SECS == 0 {
                if let Err(e) = self.surface.edit(&message, &self.line(&text)).await {
                    log::debug!("countdown edit failed: {}", e);
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = &mut cancel => break CountdownEnd::Cancelled,
            }
        };

        if end == CountdownEnd::Cancelled {
            self.update(true, 0);
        }
        if let Err(e) = self.surface.delete(&message).await {
            log::debug!("countdown delete failed: {}", e);
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::surface::{LocalSurface, SurfaceRecord};

    #[test]
    fn formats_match_clock_style() {
        assert_eq!(format_remaining(7), "07");
        assert_eq!(format_remaining(65), "01:05");
        assert_eq!(format_remaining(3600), "1:00:00");
        assert_eq!(format_remaining(10_799), "2:59:59");
    }

    #[tokio::test(start_paused = true)]
    async fn expires_and_deletes_its_message() {
        let surface = Arc::new(LocalSurface::new());
        let countdown = Countdown::new(surface.clone(), ChannelId(4), "leaving", Duration::from_secs(12));
        let timer = countdown.timer();
        let (_tx, rx) = oneshot::channel();
        let end = countdown.run(rx).await;
        assert_eq!(end, CountdownEnd::Expired);

        let t = timer.lock().unwrap().clone();
        assert!(t.done);
        let message = t.message.expect("posted");
        assert!(!surface.is_live(&message));

        let history = surface.history();
        assert!(matches!(&history[0], SurfaceRecord::Sent { text, .. } if text == "⏳ [leaving] 12s"));
        let edits: Vec<String> = history
            .iter()
            .filter_map(|r| match r {
                SurfaceRecord::Edited { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(edits, vec!["⏳ [leaving] 10s", "⏳ [leaving] 05s"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_early() {
        let surface = Arc::new(LocalSurface::new());
        let countdown = Countdown::new(surface.clone(), ChannelId(4), "leaving", Duration::from_secs(180));
        let timer = countdown.timer();
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(countdown.run(rx));
        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), CountdownEnd::Cancelled);
        let t = timer.lock().unwrap().clone();
        assert!(t.done);
        assert!(!surface.is_live(&t.message.unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_finishes_immediately() {
        let surface = Arc::new(LocalSurface::new());
        let countdown = Countdown::new(surface.clone(), ChannelId(1), "gone", Duration::ZERO);
        let (_tx, rx) = oneshot::channel();
        assert_eq!(countdown.run(rx).await, CountdownEnd::Expired);
        assert_eq!(surface.sent_texts(), vec!["⏳ [gone] 00s"]);
    }
}
