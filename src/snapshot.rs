// src/snapshot.rs
//
// The one shared mutable resource between the scheduler and the HTTP path.
// Every pipeline run publishes a whole new `Snapshot`; readers clone an `Arc`
// out from under a short read guard, so they only ever see the previous or
// the new snapshot, never a half-built one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// One scheduled fixture. Rebuilt fresh on every extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub home_team: String,
    pub away_team: String,
    /// Timezone-resolved kickoff instant; the canonical sort key.
    pub kickoff: DateTime<Utc>,
}

/// Immutable result of one pipeline run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Upcoming matches only, ordered by kickoff.
    pub matches: Vec<MatchRecord>,
    pub total_matches: usize,
    pub scraped_at: DateTime<Utc>,
    pub duration: Duration,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    current: RwLock<Option<Arc<Snapshot>>>,
    ever_succeeded: AtomicBool,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the result of a successful run. Matches are filtered to future
    /// kickoffs and sorted before the swap; `total_matches` counts the kept
    /// (future) set.
    pub fn publish_success(
        &self,
        matches: Vec<MatchRecord>,
        duration: Duration,
        scraped_at: DateTime<Utc>,
    ) {
        let mut matches: Vec<MatchRecord> =
            matches.into_iter().filter(|m| m.kickoff > scraped_at).collect();
        matches.sort_by_key(|m| m.kickoff);

        let snapshot = Arc::new(Snapshot {
            total_matches: matches.len(),
            matches,
            scraped_at,
            duration,
            success: true,
            error: None,
        });

        self.swap(snapshot);
        self.inner.ever_succeeded.store(true, Ordering::Release);
    }

    /// Publish a failed run. A previously published schedule is retained so
    /// consumers keep serving the last known-good data through an outage;
    /// only the health fields change.
    pub fn publish_failure(&self, duration: Duration, scraped_at: DateTime<Utc>, error: String) {
        let prior = self.current();
        let (matches, total_matches) = match &prior {
            Some(prev) => (prev.matches.clone(), prev.total_matches),
            None => (Vec::new(), 0),
        };

        self.swap(Arc::new(Snapshot {
            matches,
            total_matches,
            scraped_at,
            duration,
            success: false,
            error: Some(error),
        }));
    }

    /// Latest published snapshot, `None` before the first run completes.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.inner
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// True once any run has succeeded; never reset by later failures.
    pub fn ever_succeeded(&self) -> bool {
        self.inner.ever_succeeded.load(Ordering::Acquire)
    }

    fn swap(&self, snapshot: Arc<Snapshot>) {
        let mut guard = self
            .inner
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(home: &str, away: &str, kickoff: DateTime<Utc>) -> MatchRecord {
        MatchRecord {
            home_team: home.to_string(),
            away_team: away.to_string(),
            kickoff,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_until_first_publish() {
        let store = SnapshotStore::new();
        assert!(store.current().is_none());
        assert!(!store.ever_succeeded());
    }

    #[test]
    fn success_keeps_only_future_matches_sorted() {
        let store = SnapshotStore::new();
        let t = now();
        store.publish_success(
            vec![
                record("C", "D", t + chrono::Duration::hours(48)),
                record("A", "B", t + chrono::Duration::hours(1)),
                record("X", "Y", t - chrono::Duration::hours(1)),
            ],
            Duration::from_millis(120),
            t,
        );

        let snap = store.current().unwrap();
        assert!(snap.success);
        assert_eq!(snap.total_matches, 2);
        assert_eq!(snap.matches.len(), 2);
        assert_eq!(snap.matches[0].home_team, "A");
        assert_eq!(snap.matches[1].home_team, "C");
        assert!(store.ever_succeeded());
    }

    #[test]
    fn failure_retains_last_good_matches() {
        let store = SnapshotStore::new();
        let t = now();
        store.publish_success(
            vec![record("A", "B", t + chrono::Duration::hours(1))],
            Duration::from_millis(80),
            t,
        );
        store.publish_failure(
            Duration::from_secs(3),
            t + chrono::Duration::minutes(30),
            "upstream 503".to_string(),
        );

        let snap = store.current().unwrap();
        assert!(!snap.success);
        assert_eq!(snap.error.as_deref(), Some("upstream 503"));
        assert_eq!(snap.matches.len(), 1);
        assert_eq!(snap.total_matches, 1);
        assert_eq!(snap.duration, Duration::from_secs(3));
        // Readiness latch is unaffected by the failure.
        assert!(store.ever_succeeded());
    }

    #[test]
    fn failure_without_prior_snapshot_is_empty() {
        let store = SnapshotStore::new();
        store.publish_failure(Duration::from_secs(1), now(), "connect refused".into());

        let snap = store.current().unwrap();
        assert!(!snap.success);
        assert!(snap.matches.is_empty());
        assert_eq!(snap.total_matches, 0);
        assert!(!store.ever_succeeded());
    }

    #[test]
    fn readers_share_the_published_snapshot() {
        let store = SnapshotStore::new();
        let t = now();
        store.publish_success(
            vec![record("A", "B", t + chrono::Duration::hours(1))],
            Duration::from_millis(10),
            t,
        );
        let a = store.current().unwrap();
        let b = store.current().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
