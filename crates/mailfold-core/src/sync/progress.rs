//! Sync progress reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

/// Observable progress of the current sync round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Progress {
    /// No round is running.
    #[default]
    Idle,
    /// A round is running.
    Syncing {
        /// Completed tasks as a share of all tasks, 0 to 100.
        percent: u8,
        /// Label of the account that reported last.
        account: String,
        /// Messages found so far this round.
        found: usize,
        /// Status line.
        status: String,
    },
}

impl Progress {
    /// Returns true while a round is running.
    #[must_use]
    pub const fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing { .. })
    }
}

/// Percent of `total` tasks done, rounded to the nearest integer.
#[must_use]
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let completed = completed.min(total) as u128;
    let total = total as u128;
    u8::try_from((completed * 100 + total / 2) / total).unwrap_or(100)
}

fn status_line(page: u32) -> String {
    format!("Syncing Page {}...", u64::from(page) + 1)
}

struct Inner {
    tx: watch::Sender<Progress>,
    generation: AtomicU64,
    grace: Duration,
}

/// Publishes [`Progress`] on a watch channel.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("current", &*self.inner.tx.borrow())
            .field("grace", &self.inner.grace)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    /// Creates a reporter that returns to idle `grace` after a round ends.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        let (tx, _) = watch::channel(Progress::Idle);
        Self {
            inner: Arc::new(Inner {
                tx,
                generation: AtomicU64::new(0),
                grace,
            }),
        }
    }

    /// Subscribes to progress updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.inner.tx.subscribe()
    }

    /// Current progress.
    #[must_use]
    pub fn current(&self) -> Progress {
        self.inner.tx.borrow().clone()
    }

    /// Enters `Syncing` at 0% for `page`.
    pub fn start(&self, page: u32) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.tx.send_replace(Progress::Syncing {
            percent: 0,
            account: String::new(),
            found: 0,
            status: status_line(page),
        });
    }

    /// Records that `completed` of `total` tasks are done.
    pub fn advance(&self, page: u32, completed: usize, total: usize, account: &str, found: usize) {
        self.inner.tx.send_replace(Progress::Syncing {
            percent: percent(completed, total),
            account: account.to_string(),
            found,
            status: status_line(page),
        });
    }

    /// Returns to `Idle` after the grace period, unless a new round starts first.
    pub fn finish(&self) {
        if self.inner.grace.is_zero() {
            self.inner.tx.send_replace(Progress::Idle);
            return;
        }

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.grace).await;
            if inner.generation.load(Ordering::SeqCst) == generation {
                inner.tx.send_replace(Progress::Idle);
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 3), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(5, 3), 100);
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status_line(0), "Syncing Page 1...");
        assert_eq!(status_line(u32::MAX), "Syncing Page 4294967296...");
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_through_idle() {
        let reporter = ProgressReporter::new(Duration::from_millis(500));
        let rx = reporter.subscribe();

        reporter.start(0);
        reporter.advance(0, 1, 2, "work", 10);
        assert_eq!(
            *rx.borrow(),
            Progress::Syncing {
                percent: 50,
                account: "work".into(),
                found: 10,
                status: "Syncing Page 1...".into(),
            }
        );

        reporter.advance(0, 2, 2, "home", 25);
        reporter.finish();
        assert!(reporter.current().is_syncing());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(reporter.current(), Progress::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_round_cancels_pending_idle() {
        let reporter = ProgressReporter::new(Duration::from_millis(500));

        reporter.start(0);
        reporter.finish();
        tokio::time::sleep(Duration::from_millis(100)).await;
        reporter.start(1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(reporter.current().is_syncing());
    }

    #[test]
    fn test_zero_grace_is_immediate() {
        let reporter = ProgressReporter::new(Duration::ZERO);
        reporter.start(0);
        reporter.finish();
        assert_eq!(reporter.current(), Progress::Idle);
    }
}
