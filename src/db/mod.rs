use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod error;
pub mod models;

pub use error::StoreError;
use models::{Game, League};

/// Persistent lookup and write-back of game records, keyed by source id.
///
/// Implementations must be safe to share between concurrent resolutions.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Read a single game; `Ok(None)` when it was never written.
    async fn find_game(&self, src_id: &str) -> Result<Option<Game>, StoreError>;

    /// Every stored game of one league, ordered by `src_id` descending.
    async fn find_games(&self, league: League) -> Result<Vec<Game>, StoreError>;

    /// Insert or fully replace a game. The store stamps `updated_at` as part
    /// of the same write and returns the record as persisted.
    async fn upsert_game(&self, game: &Game) -> Result<Game, StoreError>;

    /// Remove every stored game, returning how many were deleted.
    async fn clear_games(&self) -> Result<usize, StoreError>;
}

/// Thread-safe SQLite handle (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ── Games ─────────────────────────────────────────────────────────────────

    pub fn get_game(&self, src_id: &str) -> Result<Option<Game>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT src_id, league, attributes, updated_at FROM games WHERE src_id = ?1",
                params![src_id],
                GameRow::from_row,
            )
            .optional()?;
        row.map(GameRow::into_game).transpose()
    }

    pub fn get_games_by_league(&self, league: League) -> Result<Vec<Game>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT src_id, league, attributes, updated_at FROM games
             WHERE league = ?1 ORDER BY src_id DESC",
        )?;
        let rows = stmt
            .query_map(params![league.as_str()], GameRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(GameRow::into_game).collect()
    }

    /// Upsert by `src_id`. The timestamp is written in the same statement as
    /// the payload, so a reader never sees new attributes with an old stamp.
    pub fn put_game(&self, game: &Game) -> Result<Game, StoreError> {
        let attributes = serde_json::to_string(&game.attributes)?;
        // Millisecond precision survives the TEXT round trip unchanged
        let updated_at = Utc::now().trunc_subsecs(3);

        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO games (src_id, league, attributes, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(src_id) DO UPDATE SET
                league=excluded.league,
                attributes=excluded.attributes,
                updated_at=excluded.updated_at",
            params![game.src_id, game.league.as_str(), attributes, updated_at],
        )?;
        if changed == 0 {
            return Err(StoreError::NotWritten(game.src_id.clone()));
        }

        Ok(Game {
            updated_at: Some(updated_at),
            ..game.clone()
        })
    }

    pub fn delete_all_games(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM games", [])?)
    }

    /// Run a blocking database call off the async worker threads.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl GameStore for Database {
    async fn find_game(&self, src_id: &str) -> Result<Option<Game>, StoreError> {
        let src_id = src_id.to_string();
        self.blocking(move |db| db.get_game(&src_id)).await
    }

    async fn find_games(&self, league: League) -> Result<Vec<Game>, StoreError> {
        self.blocking(move |db| db.get_games_by_league(league)).await
    }

    async fn upsert_game(&self, game: &Game) -> Result<Game, StoreError> {
        let game = game.clone();
        self.blocking(move |db| db.put_game(&game)).await
    }

    async fn clear_games(&self) -> Result<usize, StoreError> {
        self.blocking(|db| db.delete_all_games()).await
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

struct GameRow {
    src_id: String,
    league: String,
    attributes: String,
    updated_at: String,
}

impl GameRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(GameRow {
            src_id: row.get(0)?,
            league: row.get(1)?,
            attributes: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    fn into_game(self) -> Result<Game, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            src_id: self.src_id.clone(),
            reason,
        };
        let league: League = self
            .league
            .parse()
            .map_err(|e: models::UnknownLeague| corrupt(e.to_string()))?;
        let attributes = serde_json::from_str(&self.attributes)
            .map_err(|e| corrupt(format!("attributes: {}", e)))?;
        let updated_at = parse_timestamp(&self.updated_at)
            .ok_or_else(|| corrupt(format!("updated_at: {:?}", self.updated_at)))?;

        Ok(Game {
            src_id: self.src_id,
            league,
            attributes,
            updated_at: Some(updated_at),
        })
    }
}

/// Parse a stored stamp: RFC 3339, or the `YYYY-MM-DD HH:MM:SS[.fff][+00:00]`
/// text rusqlite writes for `DateTime<Utc>`.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|ts| ts.and_utc())
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    src_id      TEXT    PRIMARY KEY,
    league      TEXT    NOT NULL,
    attributes  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_games_league ON games(league);
"#;
