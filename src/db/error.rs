use thiserror::Error;

/// Errors raised by the game store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not encode game attributes: {0}")]
    Encode(#[from] serde_json::Error),

    /// A stored row could not be turned back into a game.
    #[error("corrupt row for game {src_id}: {reason}")]
    Corrupt { src_id: String, reason: String },

    #[error("upsert of game {0} affected no rows")]
    NotWritten(String),

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("database task failed: {0}")]
    Task(String),
}
