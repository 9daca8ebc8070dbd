use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::UpstreamError;
use super::provider::BoxScoreProvider;
use crate::db::models::{FeedGame, League};

/// Box-score provider backed by the Barstool games feed.
/// Each game lives at `<base_url>/<src_id>.json`.
pub struct BarstoolFeed {
    http: Client,
    /// Base URL for overriding in tests
    base_url: Url,
}

impl BarstoolFeed {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(base_url).map_err(|e| UpstreamError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        // http(s) URLs always have a path to append the game segment to
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(UpstreamError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {}", base_url.scheme()),
            });
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(BarstoolFeed { http, base_url })
    }

    /// URL of a single game document. The id is pushed as one path segment,
    /// so it cannot escape the feed directory.
    fn game_url(&self, src_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&format!("{}.json", src_id));
        }
        url
    }
}

#[async_trait]
impl BoxScoreProvider for BarstoolFeed {
    fn name(&self) -> &str {
        "Barstool"
    }

    async fn fetch_game(&self, src_id: &str) -> Result<FeedGame, UpstreamError> {
        let url = self.game_url(src_id);
        debug!("Fetching game {} from {}", src_id, url);

        let resp = self.http.get(url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        let raw: serde_json::Value = resp.json().await?;
        parse_game_payload(raw)
    }
}

/// Turn a feed document into a `FeedGame`.
///
/// The document must be a JSON object with a known `league`; everything else
/// is passed through untouched.
pub fn parse_game_payload(raw: serde_json::Value) -> Result<FeedGame, UpstreamError> {
    let serde_json::Value::Object(attributes) = raw else {
        return Err(UpstreamError::InvalidPayload(
            "expected a JSON object".to_string(),
        ));
    };

    let league: League = attributes
        .get("league")
        .and_then(|v| v.as_str())
        .ok_or_else(|| UpstreamError::InvalidPayload("missing league".to_string()))?
        .parse()
        .map_err(|e| UpstreamError::InvalidPayload(format!("{}", e)))?;

    Ok(FeedGame::new(league, attributes))
}
