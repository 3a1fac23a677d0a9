//! Cancellation and sleeping for the blocking retry loops.
//!
//! The serial open loop never gives up on its own, so the owning process
//! needs a way to stop it. Every loop iteration checks a
//! [`CancellationToken`]; waits go through a [`Sleeper`] so tests can run
//! the loop without real delays.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub use tokio_util::sync::CancellationToken;

/// Blocking wait between retries.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sleeper that returns immediately and records each requested duration.
///
/// Optionally cancels a token once a given number of naps have been taken,
/// which simulates an owner shutting down mid-retry.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    naps: Arc<Mutex<Vec<Duration>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` as soon as `naps` sleeps have been requested.
    pub fn cancelling(token: CancellationToken, naps: usize) -> Self {
        Self {
            naps: Arc::default(),
            cancel_after: Some((naps, token)),
        }
    }

    /// All durations requested so far, in order.
    pub fn naps(&self) -> Vec<Duration> {
        self.naps.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.naps.lock().len()
    }

    /// Total time that would have been slept.
    pub fn total(&self) -> Duration {
        self.naps.lock().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        let taken = {
            let mut naps = self.naps.lock();
            naps.push(duration);
            naps.len()
        };

        if let Some((after, token)) = &self.cancel_after {
            if taken >= *after {
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sleeper_does_not_block() {
        let sleeper = RecordingSleeper::new();
        let started = std::time::Instant::now();

        sleeper.sleep(Duration::from_secs(1));
        sleeper.sleep(Duration::from_millis(500));

        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(sleeper.count(), 2);
        assert_eq!(sleeper.total(), Duration::from_millis(1500));
    }

    #[test]
    fn test_recording_sleeper_cancels_after_threshold() {
        let token = CancellationToken::new();
        let sleeper = RecordingSleeper::cancelling(token.clone(), 2);

        sleeper.sleep(Duration::from_secs(1));
        assert!(!token.is_cancelled());

        sleeper.sleep(Duration::from_secs(1));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_thread_sleeper_waits() {
        let started = std::time::Instant::now();
        ThreadSleeper.sleep(Duration::from_millis(20));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
