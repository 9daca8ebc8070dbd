//! Read-through resolution of a single game.
//!
//! The store is consulted first. A record inside the freshness window is
//! served as-is; anything older (or missing) is fetched from the feed once,
//! written back, and the persisted copy is returned.
//!
//! ```text
//!  find_game ──▶ fresh? ──yes──▶ stored record
//!                  │
//!                  no
//!                  ▼
//!            fetch (bounded by fetch permits) ──▶ upsert_game ──▶ persisted record
//! ```

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use super::error::FetchFailure;
use super::freshness::FreshnessPolicy;
use crate::box_scores::{fetch_with_policy, BoxScoreProvider, FetchPolicy};
use crate::db::models::Game;
use crate::db::GameStore;

/// Resolves games against the store, refreshing stale ones from the feed.
///
/// Cloning is cheap; clones share the store handle, the provider and the
/// fetch permits.
#[derive(Clone)]
pub struct GameReconciler {
    store: Arc<dyn GameStore>,
    provider: Arc<dyn BoxScoreProvider>,
    freshness: FreshnessPolicy,
    fetch_policy: FetchPolicy,
    /// Caps concurrent upstream fetches across every resolution
    fetch_permits: Arc<Semaphore>,
}

impl GameReconciler {
    pub fn new(
        store: Arc<dyn GameStore>,
        provider: Arc<dyn BoxScoreProvider>,
        freshness: FreshnessPolicy,
        fetch_policy: FetchPolicy,
        max_concurrent_fetches: usize,
    ) -> Self {
        GameReconciler {
            store,
            provider,
            freshness,
            fetch_policy,
            fetch_permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
        }
    }

    /// Best available record for `src_id`: at most one feed fetch and one
    /// store write per call. Fails if the feed or the write-back fails, even
    /// when a stale copy is on hand.
    pub async fn resolve(&self, src_id: &str) -> Result<Game, FetchFailure> {
        let stored = match self.store.find_game(src_id).await {
            Ok(game) => game,
            Err(e) => {
                error!("Store read for game {} failed, treating as miss: {}", src_id, e);
                None
            }
        };

        if let Some(game) = stored {
            if self.freshness.is_fresh(game.updated_at, Utc::now()) {
                debug!("Game {} served from store", src_id);
                return Ok(game);
            }
        }

        let feed_game = {
            let _permit = self
                .fetch_permits
                .acquire()
                .await
                .map_err(|e| FetchFailure::Interrupted {
                    src_id: src_id.to_string(),
                    reason: e.to_string(),
                })?;
            fetch_with_policy(self.provider.as_ref(), src_id, &self.fetch_policy)
                .await
                .map_err(|source| {
                    error!(
                        "[{}] fetch of game {} failed: {}",
                        self.provider.name(),
                        src_id,
                        source
                    );
                    FetchFailure::Upstream {
                        src_id: src_id.to_string(),
                        source,
                    }
                })?
        };

        let persisted = self
            .store
            .upsert_game(&Game::from_feed(src_id, feed_game))
            .await
            .map_err(|source| {
                error!("Write-back of game {} failed: {}", src_id, source);
                FetchFailure::WriteBack {
                    src_id: src_id.to_string(),
                    source,
                }
            })?;

        debug!("Game {} refreshed from {}", src_id, self.provider.name());
        Ok(persisted)
    }

    pub fn freshness(&self) -> FreshnessPolicy {
        self.freshness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::League;
    use crate::db::Database;
    use crate::games::testing::{stored_game, MemoryStore, ScriptedFeed, Step};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn reconciler(store: Arc<dyn GameStore>, feed: Arc<ScriptedFeed>) -> GameReconciler {
        GameReconciler::new(
            store,
            feed,
            FreshnessPolicy::from_secs(15),
            FetchPolicy {
                timeout: Duration::from_secs(1),
                retries: 0,
                backoff: Duration::from_millis(1),
            },
            4,
        )
    }

    #[tokio::test]
    async fn test_fresh_record_served_verbatim() {
        let stored = stored_game("123", League::Mlb, Utc::now());
        let store = Arc::new(MemoryStore::new().seed(stored.clone()));
        let feed = Arc::new(ScriptedFeed::new().script("123", vec![Step::Game("MLB")]));

        let game = reconciler(store.clone(), feed.clone())
            .resolve("123")
            .await
            .unwrap();

        assert_eq!(game, stored);
        assert_eq!(store.reads(), 1);
        assert_eq!(feed.total_calls(), 0);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_stale_record_is_refreshed_once() {
        let old = Utc::now() - ChronoDuration::hours(1);
        let store = Arc::new(MemoryStore::new().seed(stored_game("123", League::Mlb, old)));
        let feed = Arc::new(ScriptedFeed::new().script("123", vec![Step::Game("MLB")]));

        let game = reconciler(store.clone(), feed.clone())
            .resolve("123")
            .await
            .unwrap();

        assert_eq!(feed.calls("123"), 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(game.attributes["status"], "scheduled");
        assert!(game.updated_at.unwrap() > old);
        assert_eq!(store.get("123"), Some(game));
    }

    #[tokio::test]
    async fn test_missing_record_is_fetched_and_written() {
        let store = Arc::new(MemoryStore::new());
        let feed = Arc::new(ScriptedFeed::new().script("123", vec![Step::Game("NBA")]));

        let game = reconciler(store.clone(), feed.clone())
            .resolve("123")
            .await
            .unwrap();

        assert_eq!(game.src_id, "123");
        assert_eq!(game.league, League::Nba);
        assert_eq!(feed.calls("123"), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_falls_through_to_feed() {
        let store = Arc::new(
            MemoryStore::new()
                .seed(stored_game("123", League::Mlb, Utc::now()))
                .failing_reads(),
        );
        let feed = Arc::new(ScriptedFeed::new().script("123", vec![Step::Game("MLB")]));

        let game = reconciler(store.clone(), feed.clone())
            .resolve("123")
            .await
            .unwrap();

        assert_eq!(game.attributes["status"], "scheduled");
        assert_eq!(feed.calls("123"), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_feed_failure_fails_without_write() {
        let old = Utc::now() - ChronoDuration::hours(1);
        let store = Arc::new(MemoryStore::new().seed(stored_game("123", League::Mlb, old)));
        let feed = Arc::new(ScriptedFeed::new().script("123", vec![Step::Unavailable]));

        let err = reconciler(store.clone(), feed.clone())
            .resolve("123")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchFailure::Upstream { .. }));
        assert_eq!(err.src_id(), "123");
        assert_eq!(err.to_string(), "failed to retrieve game 123");
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_invalid_feed_payload_fails() {
        let store = Arc::new(MemoryStore::new());
        let feed = Arc::new(ScriptedFeed::new().script("123", vec![Step::Invalid]));

        let err = reconciler(store.clone(), feed)
            .resolve("123")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchFailure::Upstream { .. }));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_fails_even_with_stale_copy() {
        let old = Utc::now() - ChronoDuration::hours(1);
        let store = Arc::new(
            MemoryStore::new()
                .seed(stored_game("123", League::Mlb, old))
                .failing_writes(),
        );
        let feed = Arc::new(ScriptedFeed::new().script("123", vec![Step::Game("MLB")]));

        let err = reconciler(store.clone(), feed.clone())
            .resolve("123")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchFailure::WriteBack { .. }));
        assert_eq!(err.src_id(), "123");
        assert_eq!(feed.calls("123"), 1);
    }

    #[tokio::test]
    async fn test_second_resolve_within_window_hits_sqlite() {
        let db = Database::open_in_memory().unwrap();
        let feed = Arc::new(ScriptedFeed::new().script("123", vec![Step::Game("MLB")]));
        let reconciler = reconciler(Arc::new(db), feed.clone());

        let first = reconciler.resolve("123").await.unwrap();
        assert_eq!(first.src_id, "123");
        assert_eq!(first.league, League::Mlb);
        assert_eq!(first.attributes["status"], "scheduled");
        let stamp = first.updated_at.unwrap();
        assert!(Utc::now() - stamp < ChronoDuration::seconds(5));

        let second = reconciler.resolve("123").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(feed.calls("123"), 1);
    }

    #[tokio::test]
    async fn test_fetch_permits_bound_concurrency() {
        let store = Arc::new(MemoryStore::new());
        let mut feed = ScriptedFeed::new();
        for id in ["1", "2"] {
            feed = feed
                .script(id, vec![Step::Game("NBA")])
                .delay(id, Duration::from_millis(100));
        }
        let reconciler = GameReconciler::new(
            store,
            Arc::new(feed),
            FreshnessPolicy::from_secs(15),
            FetchPolicy::default(),
            1,
        );

        let started = std::time::Instant::now();
        let (a, b) = tokio::join!(reconciler.resolve("1"), reconciler.resolve("2"));
        a.unwrap();
        b.unwrap();
        // One permit: the two 100ms fetches cannot overlap
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
