use async_trait::async_trait;

use super::error::UpstreamError;
use crate::db::models::FeedGame;

/// Trait that every upstream box-score source must implement.
#[async_trait]
pub trait BoxScoreProvider: Send + Sync {
    /// Fetch the authoritative record for a single game.
    async fn fetch_game(&self, src_id: &str) -> Result<FeedGame, UpstreamError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
