use std::collections::{HashMap, HashSet};
use tokio::task::{Id, JoinSet};
use tracing::warn;

use super::error::FetchFailure;
use super::reconciler::GameReconciler;
use crate::db::models::Game;

/// Resolve every id concurrently, one task per distinct id.
///
/// Games come back in completion order. The first failure to be joined is
/// returned; the remaining tasks are detached rather than aborted, so their
/// write-backs still land in the store.
pub async fn resolve_all<S>(
    reconciler: &GameReconciler,
    ids: &[S],
) -> Result<Vec<Game>, FetchFailure>
where
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut tasks = JoinSet::new();
    // Task id -> game id, so a panicked task still reports which game it was
    let mut pending: HashMap<Id, String> = HashMap::new();
    for id in ids {
        let id: &str = id.as_ref();
        if !seen.insert(id) {
            continue;
        }
        let reconciler = reconciler.clone();
        let src_id = id.to_string();
        let handle = tasks.spawn(async move { reconciler.resolve(&src_id).await });
        pending.insert(handle.id(), id.to_string());
    }

    let mut games = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        let outcome = match joined {
            Ok((task, resolved)) => {
                pending.remove(&task);
                resolved
            }
            Err(e) => Err(FetchFailure::Interrupted {
                src_id: pending.remove(&e.id()).unwrap_or_default(),
                reason: e.to_string(),
            }),
        };

        match outcome {
            Ok(game) => games.push(game),
            Err(failure) => {
                if !tasks.is_empty() {
                    warn!(
                        "Batch failed ({}); leaving {} sibling resolution(s) to finish",
                        failure,
                        tasks.len()
                    );
                }
                tasks.detach_all();
                return Err(failure);
            }
        }
    }

    Ok(games)
}
