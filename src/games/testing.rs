//! Test doubles for the store and the upstream feed.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::box_scores::feed::parse_game_payload;
use crate::box_scores::{BoxScoreProvider, UpstreamError};
use crate::db::models::{FeedGame, Game, League};
use crate::db::{GameStore, StoreError};

/// In-memory store with failure switches and call counters.
#[derive(Default)]
pub struct MemoryStore {
    games: Mutex<HashMap<String, Game>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record verbatim, timestamp included.
    pub fn seed(self, game: Game) -> Self {
        self.games
            .lock()
            .unwrap()
            .insert(game.src_id.clone(), game);
        self
    }

    pub fn failing_reads(self) -> Self {
        self.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn get(&self, src_id: &str) -> Option<Game> {
        self.games.lock().unwrap().get(src_id).cloned()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn find_game(&self, src_id: &str) -> Result<Option<Game>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Task("store offline".to_string()));
        }
        Ok(self.get(src_id))
    }

    async fn find_games(&self, league: League) -> Result<Vec<Game>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Task("store offline".to_string()));
        }
        let mut games: Vec<Game> = self
            .games
            .lock()
            .unwrap()
            .values()
            .filter(|g| g.league == league)
            .cloned()
            .collect();
        games.sort_by(|a, b| b.src_id.cmp(&a.src_id));
        Ok(games)
    }

    async fn upsert_game(&self, game: &Game) -> Result<Game, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::NotWritten(game.src_id.clone()));
        }
        let stored = Game {
            updated_at: Some(Utc::now().trunc_subsecs(3)),
            ..game.clone()
        };
        self.games
            .lock()
            .unwrap()
            .insert(stored.src_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn clear_games(&self) -> Result<usize, StoreError> {
        let mut games = self.games.lock().unwrap();
        let n = games.len();
        games.clear();
        Ok(n)
    }
}

/// One scripted feed response.
#[derive(Debug, Clone)]
pub enum Step {
    /// `{"league": <league>, "status": "scheduled"}`
    Game(&'static str),
    /// HTTP 503
    Unavailable,
    /// A document with no league
    Invalid,
    /// The provider itself panics
    Panic,
}

/// Feed that plays back a script per game id. The last step repeats once
/// the script runs out; unknown ids answer 404.
#[derive(Default)]
pub struct ScriptedFeed {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, src_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(src_id.to_string(), steps.into());
        self
    }

    /// Delay every answer for `src_id`.
    pub fn delay(mut self, src_id: &str, delay: Duration) -> Self {
        self.delays.insert(src_id.to_string(), delay);
        self
    }

    pub fn calls(&self, src_id: &str) -> usize {
        self.calls.lock().unwrap().get(src_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn next_step(&self, src_id: &str) -> Option<Step> {
        let mut scripts = self.scripts.lock().unwrap();
        let steps = scripts.get_mut(src_id)?;
        if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        }
    }
}

#[async_trait]
impl BoxScoreProvider for ScriptedFeed {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn fetch_game(&self, src_id: &str) -> Result<FeedGame, UpstreamError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(src_id.to_string())
            .or_default() += 1;
        let step = self.next_step(src_id);

        if let Some(delay) = self.delays.get(src_id) {
            tokio::time::sleep(*delay).await;
        }

        match step {
            Some(Step::Game(league)) => {
                parse_game_payload(json!({ "league": league, "status": "scheduled" }))
            }
            Some(Step::Unavailable) => Err(UpstreamError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "try later".to_string(),
            }),
            Some(Step::Invalid) => parse_game_payload(json!({ "status": "scheduled" })),
            Some(Step::Panic) => panic!("scripted provider panic for {}", src_id),
            None => Err(UpstreamError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                body: String::new(),
            }),
        }
    }
}

/// A stored game with the given stamp.
pub fn stored_game(src_id: &str, league: League, updated_at: DateTime<Utc>) -> Game {
    Game {
        src_id: src_id.to_string(),
        league,
        attributes: json!({ "status": "completed" })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        updated_at: Some(updated_at),
    }
}
