//! Change notifications from the backend, modeled as cancellable
//! subscriptions. Subscribers receive which table changed and no row payload;
//! the only correct reaction is a full re-fetch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::backend::CatalogBackend;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Courses,
    Prerequisites,
    WeeklySlots,
    CompletedCourses,
}

/// Fan-out point for table-change events. One logical feed per store; each
/// view takes its own `Subscription` and drops it on teardown.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Table>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn notify(&self, table: Table) {
        // No receivers is fine: nobody is watching.
        let _ = self.sender.send(table);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Dropping the subscription unsubscribes; a disposed view stops receiving
/// callbacks instead of being written into after teardown.
pub struct Subscription {
    receiver: broadcast::Receiver<Table>,
}

impl Subscription {
    /// Waits for the next change. Returns None once the feed is gone. A
    /// lagged receiver skips ahead, which is harmless because every event
    /// means the same thing: re-fetch.
    pub async fn changed(&mut self) -> Option<Table> {
        loop {
            match self.receiver.recv().await {
                Ok(table) => return Some(table),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone)]
struct Fingerprint {
    rows: usize,
    latest: Option<String>,
}

/// Polls the four backend tables and emits a change event whenever a table's
/// fingerprint (row count + newest updated_at) moves. Poll errors are logged
/// and the loop continues.
pub struct ChangeWatcher {
    backend: Arc<dyn CatalogBackend>,
    feed: ChangeFeed,
    subject_id: Option<String>,
    interval: Duration,
    courses: Fingerprint,
    prerequisites: Fingerprint,
    weekly_slots: Fingerprint,
    completed: Fingerprint,
}

impl ChangeWatcher {
    pub fn new(
        backend: Arc<dyn CatalogBackend>,
        feed: ChangeFeed,
        subject_id: Option<String>,
        interval_secs: u64,
    ) -> Self {
        Self {
            backend,
            feed,
            subject_id,
            interval: Duration::from_secs(interval_secs),
            courses: Fingerprint::default(),
            prerequisites: Fingerprint::default(),
            weekly_slots: Fingerprint::default(),
            completed: Fingerprint::default(),
        }
    }

    pub async fn start(mut self) {
        info!("starting change watcher (interval: {:?})", self.interval);
        // Prime fingerprints so startup does not fire a spurious change.
        if let Err(e) = self.poll_once(false).await {
            warn!("initial watcher poll failed: {}", e);
        }
        loop {
            tokio::time::sleep(self.interval).await;
            if let Err(e) = self.poll_once(true).await {
                warn!("watcher poll failed: {}", e);
            }
        }
    }

    async fn poll_once(&mut self, notify: bool) -> Result<(), AppError> {
        let courses = fingerprint(
            self.backend
                .list_courses()
                .await?
                .iter()
                .map(|r| r.updated_at.clone()),
        );
        let prerequisites = fingerprint(
            self.backend
                .list_prerequisites()
                .await?
                .iter()
                .map(|r| r.updated_at.clone()),
        );
        let weekly_slots = fingerprint(
            self.backend
                .list_weekly_slots()
                .await?
                .iter()
                .map(|r| r.updated_at.clone()),
        );
        let completed = match &self.subject_id {
            Some(subject_id) => fingerprint(
                self.backend
                    .list_completed(subject_id)
                    .await?
                    .iter()
                    .map(|r| r.updated_at.clone()),
            ),
            None => Fingerprint::default(),
        };

        for (table, next, current) in [
            (Table::Courses, courses, &mut self.courses),
            (Table::Prerequisites, prerequisites, &mut self.prerequisites),
            (Table::WeeklySlots, weekly_slots, &mut self.weekly_slots),
            (Table::CompletedCourses, completed, &mut self.completed),
        ] {
            if next != *current {
                *current = next;
                if notify {
                    info!("change detected on {:?}", table);
                    self.feed.notify(table);
                }
            }
        }
        Ok(())
    }
}

fn fingerprint(timestamps: impl Iterator<Item = Option<String>>) -> Fingerprint {
    let mut rows = 0;
    let mut latest: Option<String> = None;
    for ts in timestamps {
        rows += 1;
        if ts > latest {
            latest = ts;
        }
    }
    Fingerprint { rows, latest }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_reaches_subscriber() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe();
        feed.notify(Table::Courses);
        assert_eq!(sub.changed().await, Some(Table::Courses));
    }

    #[tokio::test]
    async fn dropped_feed_closes_subscription() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe();
        drop(feed);
        assert_eq!(sub.changed().await, None);
    }

    #[test]
    fn fingerprint_tracks_count_and_newest_timestamp() {
        let a = fingerprint(
            vec![Some("2026-01-01T00:00:00Z".to_string()), None].into_iter(),
        );
        let b = fingerprint(
            vec![Some("2026-01-02T00:00:00Z".to_string()), None].into_iter(),
        );
        assert_ne!(a, b);
        assert_eq!(a.rows, 2);
    }
}
