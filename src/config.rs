use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::box_scores::FetchPolicy;
use crate::db::models::League;
use crate::games::{FreshnessPolicy, LeagueSchedule};

/// Box score API backed by SQLite with read-through refresh from the feed
#[derive(Parser, Debug, Clone)]
#[command(name = "boxscore-server", version, about)]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8081")]
    pub listen_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "boxscores.db")]
    pub database_path: String,

    /// Base URL of the upstream games feed (`<url>/<id>.json`)
    #[arg(
        long,
        env = "FEED_URL",
        default_value = "https://chumley.barstoolsports.com/dev/data/games"
    )]
    pub feed_url: String,

    /// Game ids served for league=NBA (comma separated)
    #[arg(
        long,
        env = "NBA_GAME_IDS",
        value_delimiter = ',',
        default_value = "6c974274-4bfc-4af8-a9c4-8b926637ba74"
    )]
    pub nba_game_ids: Vec<String>,

    /// Game ids served for league=MLB (comma separated)
    #[arg(
        long,
        env = "MLB_GAME_IDS",
        value_delimiter = ',',
        default_value = "eed38457-db28-4658-ae4f-4d4d38e9e212"
    )]
    pub mlb_game_ids: Vec<String>,

    /// Seconds a stored game may be served before it is refreshed
    #[arg(long, env = "FRESHNESS_WINDOW_SECS", default_value = "15")]
    pub freshness_window_secs: u64,

    /// Maximum upstream fetches in flight at once
    #[arg(long, env = "MAX_CONCURRENT_FETCHES", default_value = "8")]
    pub max_concurrent_fetches: usize,

    /// Timeout for each upstream attempt, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "10")]
    pub upstream_timeout_secs: u64,

    /// Extra attempts for transient upstream failures (0 = single attempt)
    #[arg(long, env = "UPSTREAM_RETRIES", default_value = "0")]
    pub upstream_retries: u32,

    /// Base retry delay in milliseconds, doubled per attempt
    #[arg(long, env = "RETRY_BACKOFF_MS", default_value = "250")]
    pub retry_backoff_ms: u64,

    /// Delete every stored game before serving
    #[arg(long, env = "CLEAR_CACHE", default_value = "false")]
    pub clear_cache: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid listen_addr {}: {}", self.listen_addr, e))?;

        let feed = url::Url::parse(&self.feed_url)
            .map_err(|e| anyhow::anyhow!("invalid feed_url {}: {}", self.feed_url, e))?;
        if !matches!(feed.scheme(), "http" | "https") {
            anyhow::bail!("feed_url must be http(s), got {}", feed.scheme());
        }

        if self.max_concurrent_fetches == 0 {
            anyhow::bail!("max_concurrent_fetches must be at least 1");
        }
        if self.upstream_timeout_secs == 0 {
            anyhow::bail!("upstream_timeout_secs must be at least 1");
        }
        for (league, ids) in [
            (League::Nba, &self.nba_game_ids),
            (League::Mlb, &self.mlb_game_ids),
        ] {
            if ids.iter().any(|id| id.trim().is_empty()) {
                anyhow::bail!("{} game ids must not be blank", league);
            }
        }
        Ok(())
    }

    pub fn freshness(&self) -> FreshnessPolicy {
        FreshnessPolicy::from_secs(self.freshness_window_secs)
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(self.upstream_timeout_secs),
            retries: self.upstream_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn schedule(&self) -> LeagueSchedule {
        LeagueSchedule::new()
            .with_games(League::Nba, self.nba_game_ids.iter().cloned())
            .with_games(League::Mlb, self.mlb_game_ids.iter().cloned())
    }
}
