use std::collections::BTreeMap;

use crate::db::models::League;

/// Which game ids make up each league's slate.
#[derive(Debug, Clone, Default)]
pub struct LeagueSchedule {
    games: BTreeMap<League, Vec<String>>,
}

impl LeagueSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add games to a league, skipping blanks and ids already listed.
    pub fn with_games<I, S>(mut self, league: League, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.games.entry(league).or_default();
        for id in ids {
            let id = id.into().trim().to_string();
            if !id.is_empty() && !entry.contains(&id) {
                entry.push(id);
            }
        }
        self
    }

    pub fn game_ids(&self, league: League) -> &[String] {
        self.games.get(&league).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, src_id: &str) -> bool {
        self.games.values().flatten().any(|id| id == src_id)
    }

    pub fn len(&self) -> usize {
        self.games.values().map(Vec::len).sum()
    }
}
