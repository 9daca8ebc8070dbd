pub mod error;
pub mod feed;
pub mod provider;

pub use error::UpstreamError;
pub use feed::BarstoolFeed;
pub use provider::BoxScoreProvider;

use rand::Rng;
use std::time::Duration;
use tracing::warn;

use crate::db::models::FeedGame;

/// How a single upstream fetch is bounded and retried.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Upper bound on each attempt
    pub timeout: Duration,
    /// Extra attempts after the first, for transient failures only
    pub retries: u32,
    /// Base delay before a retry; doubled every attempt
    pub backoff: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            timeout: Duration::from_secs(10),
            retries: 0,
            backoff: Duration::from_millis(250),
        }
    }
}

impl FetchPolicy {
    /// Delay before retry number `attempt` (1-based): exponential plus up to
    /// 50% random jitter so concurrent retries don't line up.
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(1u32 << (attempt - 1).min(16));
        let jitter_ms = base.as_millis() as u64 / 2;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        base + jitter
    }
}

/// Fetch one game, enforcing the policy's timeout on every attempt and
/// retrying transient failures with exponential backoff.
pub async fn fetch_with_policy(
    provider: &dyn BoxScoreProvider,
    src_id: &str,
    policy: &FetchPolicy,
) -> Result<FeedGame, UpstreamError> {
    let mut attempt = 0u32;
    loop {
        let result = match tokio::time::timeout(policy.timeout, provider.fetch_game(src_id)).await
        {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(policy.timeout)),
        };

        match result {
            Ok(game) => return Ok(game),
            Err(e) if e.is_transient() && attempt < policy.retries => {
                attempt += 1;
                let delay = policy.retry_delay(attempt);
                warn!(
                    "[{}] fetch of game {} failed ({}), retry {}/{} in {:?}",
                    provider.name(),
                    src_id,
                    e,
                    attempt,
                    policy.retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
