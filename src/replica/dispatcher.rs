//! Dual-write dispatcher
//!
//! After a primary write commits, services hand the resulting [`Mutation`]
//! to the dispatcher. When a secondary store is configured the mutation is
//! applied on a background task; the request never waits for it and never
//! sees its outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use super::mutation::Mutation;
use super::store::SecondaryStore;
use crate::config::ReplicaConfig;
use crate::error::AppError;
use crate::metrics::{REPLICATION_IN_FLIGHT, observe_replication};

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// What happened to a dispatched mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Replication is disabled; nothing was spawned
    Skipped,
    /// A background task now owns the mutation
    Queued,
    /// Too many replica writes pending; the mutation was dropped
    Shed,
}

/// Fire-and-forget replication to the secondary store
///
/// Cheap to clone. A dispatcher built without a secondary URL is a no-op.
#[derive(Clone, Default)]
pub struct DualWriteDispatcher {
    inner: Option<Arc<Replicator>>,
}

struct Replicator {
    store: SecondaryStore,
    permits: Semaphore,
    tracker: TaskTracker,
    max_pending: usize,
    attempt_timeout: Duration,
    retry_attempts: u32,
}

impl DualWriteDispatcher {
    /// Dispatcher that never replicates
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Build from configuration
    ///
    /// Returns a disabled dispatcher when `replica.url` is unset. The
    /// secondary store is not contacted here.
    ///
    /// # Errors
    /// Returns error if the configured URL is malformed
    pub fn from_config(config: &ReplicaConfig) -> Result<Self, AppError> {
        let Some(url) = config.url() else {
            return Ok(Self::disabled());
        };

        let store = SecondaryStore::connect_lazy(url, config)?;
        tracing::info!(
            max_in_flight = config.max_in_flight,
            max_pending = config.max_pending,
            "Secondary replication enabled"
        );

        Ok(Self {
            inner: Some(Arc::new(Replicator {
                store,
                permits: Semaphore::new(config.max_in_flight.max(1)),
                tracker: TaskTracker::new(),
                max_pending: config.max_pending.max(1),
                attempt_timeout: Duration::from_secs(config.timeout_seconds.max(1)),
                retry_attempts: config.retry_attempts,
            })),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Hand a committed primary write to the secondary store.
    ///
    /// Must be called from within a Tokio runtime when replication is enabled.
    pub fn dispatch(&self, operation: &'static str, mutation: Mutation) -> Dispatch {
        let Some(replicator) = &self.inner else {
            return Dispatch::Skipped;
        };

        let entity = mutation.entity();
        if replicator.tracker.len() >= replicator.max_pending {
            tracing::warn!(
                operation,
                entity,
                key = %mutation.key(),
                max_pending = replicator.max_pending,
                "Replica backlog full; dropping secondary write"
            );
            observe_replication(entity, "shed", Duration::ZERO);
            return Dispatch::Shed;
        }

        let replicator = Arc::clone(replicator);
        REPLICATION_IN_FLIGHT.inc();
        replicator.tracker.clone().spawn(async move {
            let started = Instant::now();
            let outcome = replicator.replicate(operation, &mutation).await;
            observe_replication(entity, outcome, started.elapsed());
            REPLICATION_IN_FLIGHT.dec();
        });

        Dispatch::Queued
    }

    /// Wait until every replica write dispatched so far has finished.
    pub async fn flush(&self) {
        let Some(replicator) = &self.inner else {
            return;
        };

        let pending = replicator.tracker.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for replica writes to finish");
        }

        replicator.tracker.close();
        replicator.tracker.wait().await;
        replicator.tracker.reopen();
    }

    /// Replica writes spawned and not yet finished
    pub fn in_flight(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |replicator| replicator.tracker.len())
    }

    /// Secondary store handle, when replication is enabled
    pub fn store(&self) -> Option<&SecondaryStore> {
        self.inner.as_ref().map(|replicator| &replicator.store)
    }
}

impl Replicator {
    /// Apply one mutation with a per-attempt timeout and linear backoff.
    ///
    /// Returns the outcome label recorded in metrics.
    async fn replicate(&self, operation: &'static str, mutation: &Mutation) -> &'static str {
        let Ok(_permit) = self.permits.acquire().await else {
            return "failed";
        };

        let entity = mutation.entity();
        for attempt in 0..=self.retry_attempts {
            match tokio::time::timeout(self.attempt_timeout, self.store.apply(mutation)).await {
                Ok(Ok(())) => {
                    tracing::debug!(operation, entity, key = %mutation.key(), "Replica write completed");
                    return "succeeded";
                }
                Ok(Err(error)) => {
                    tracing::warn!(
                        operation,
                        entity,
                        key = %mutation.key(),
                        attempt = attempt + 1,
                        %error,
                        "Replica write failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        operation,
                        entity,
                        key = %mutation.key(),
                        attempt = attempt + 1,
                        timeout_seconds = self.attempt_timeout.as_secs(),
                        "Replica write timed out"
                    );
                }
            }

            if attempt < self.retry_attempts {
                tokio::time::sleep(RETRY_BACKOFF * (attempt + 1)).await;
            }
        }

        tracing::error!(
            operation,
            entity,
            key = %mutation.key(),
            "Giving up on replica write; secondary store is now behind"
        );
        "failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Follow, User};
    use crate::metrics::REPLICATION_TASKS_TOTAL;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_user(id: i64, username: &str) -> User {
        let now = Utc::now();
        User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
            confirmed: false,
            name: None,
            headline: None,
            location: None,
            about_me: None,
            member_since: now,
            last_seen: now,
            last_message_read_time: None,
        }
    }

    fn replica_config(url: String) -> ReplicaConfig {
        ReplicaConfig {
            url: Some(url),
            timeout_seconds: 5,
            retry_attempts: 0,
            ..ReplicaConfig::default()
        }
    }

    #[test]
    fn disabled_dispatcher_spawns_nothing() {
        let dispatcher = DualWriteDispatcher::disabled();

        let outcome = dispatcher.dispatch("register_user", Mutation::UpsertUser(sample_user(1, "a")));

        assert_eq!(outcome, Dispatch::Skipped);
        assert_eq!(dispatcher.in_flight(), 0);
        assert!(!dispatcher.is_enabled());
    }

    #[test]
    fn missing_url_builds_disabled_dispatcher() {
        let dispatcher = DualWriteDispatcher::from_config(&ReplicaConfig::default()).unwrap();
        assert!(!dispatcher.is_enabled());
        assert!(dispatcher.store().is_none());
    }

    #[tokio::test]
    async fn sqlite_replica_converges_after_flush() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            temp_dir.path().join("replica.db").display()
        );
        let dispatcher = DualWriteDispatcher::from_config(&replica_config(url)).unwrap();

        let mut alice = sample_user(1, "alice");
        assert_eq!(
            dispatcher.dispatch("register_user", Mutation::UpsertUser(alice.clone())),
            Dispatch::Queued
        );
        dispatcher.dispatch("register_user", Mutation::UpsertUser(sample_user(2, "bob")));
        dispatcher.flush().await;

        alice.confirmed = true;
        dispatcher.dispatch("confirm_user", Mutation::UpsertUser(alice));
        dispatcher.dispatch(
            "follow",
            Mutation::UpsertFollow(Follow {
                follower_id: 1,
                followed_id: 2,
                timestamp: Utc::now(),
            }),
        );
        dispatcher.flush().await;

        let store = dispatcher.store().unwrap();
        assert_eq!(store.count_rows("users").await.unwrap(), 2);
        assert_eq!(store.count_rows("follows").await.unwrap(), 1);
        assert_eq!(dispatcher.in_flight(), 0);

        dispatcher.dispatch(
            "unfollow",
            Mutation::DeleteFollow {
                follower_id: 1,
                followed_id: 2,
            },
        );
        dispatcher.flush().await;
        assert_eq!(store.count_rows("follows").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn full_backlog_sheds_writes() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            temp_dir.path().join("replica.db").display()
        );
        let config = ReplicaConfig {
            max_in_flight: 1,
            max_pending: 1,
            ..replica_config(url)
        };
        let dispatcher = DualWriteDispatcher::from_config(&config).unwrap();

        // Current-thread runtime: the first task cannot finish before the second dispatch.
        let first = dispatcher.dispatch("register_user", Mutation::UpsertUser(sample_user(1, "a")));
        let second = dispatcher.dispatch("register_user", Mutation::UpsertUser(sample_user(2, "b")));

        assert_eq!(first, Dispatch::Queued);
        assert_eq!(second, Dispatch::Shed);
        dispatcher.flush().await;
        assert_eq!(dispatcher.store().unwrap().count_rows("users").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unreachable_replica_still_drains() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!(
            "sqlite://{}",
            temp_dir.path().join("missing").join("replica.db").display()
        );
        let config = ReplicaConfig {
            retry_attempts: 1,
            ..replica_config(url)
        };
        let dispatcher = DualWriteDispatcher::from_config(&config).unwrap();
        let failures_before = REPLICATION_TASKS_TOTAL
            .with_label_values(&["user", "failed"])
            .get();

        assert_eq!(
            dispatcher.dispatch("register_user", Mutation::UpsertUser(sample_user(1, "a"))),
            Dispatch::Queued
        );
        dispatcher.flush().await;

        assert_eq!(dispatcher.in_flight(), 0);
        assert!(
            REPLICATION_TASKS_TOTAL
                .with_label_values(&["user", "failed"])
                .get()
                > failures_before
        );
    }
}
