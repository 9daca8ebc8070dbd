use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Keys owned by the record envelope. They never live inside `attributes`.
pub const RESERVED_KEYS: [&str; 3] = ["src_id", "league", "updated_at"];

/// Leagues the service knows how to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum League {
    #[serde(rename = "NBA")]
    Nba,
    #[serde(rename = "MLB")]
    Mlb,
}

impl League {
    pub fn as_str(&self) -> &'static str {
        match self {
            League::Nba => "NBA",
            League::Mlb => "MLB",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown league: {0}")]
pub struct UnknownLeague(pub String);

impl FromStr for League {
    type Err = UnknownLeague;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NBA" => Ok(League::Nba),
            "MLB" => Ok(League::Mlb),
            _ => Err(UnknownLeague(s.to_string())),
        }
    }
}

/// A game record as persisted and served.
///
/// `attributes` carries whatever the feed reports (teams, venue, period
/// scores, status...) and is flattened into the top-level JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Feed-side game identifier, the store key
    pub src_id: String,
    pub league: League,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    /// Set by the store on every write; `None` until first persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Game {
    /// Attach the source id to a freshly fetched feed game.
    pub fn from_feed(src_id: &str, feed: FeedGame) -> Self {
        Game {
            src_id: src_id.to_string(),
            league: feed.league,
            attributes: feed.attributes,
            updated_at: None,
        }
    }
}

/// A game exactly as the upstream feed describes it: no id, no timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedGame {
    pub league: League,
    pub attributes: Map<String, Value>,
}

impl FeedGame {
    /// Build from a raw attribute map, pulling out the envelope keys.
    pub fn new(league: League, mut attributes: Map<String, Value>) -> Self {
        for key in RESERVED_KEYS {
            attributes.remove(key);
        }
        FeedGame { league, attributes }
    }
}
