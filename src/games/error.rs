use thiserror::Error;

use crate::box_scores::UpstreamError;
use crate::db::StoreError;

/// Why a game could not be resolved. Display text is what callers may show.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("failed to retrieve game {src_id}")]
    Upstream {
        src_id: String,
        #[source]
        source: UpstreamError,
    },

    #[error("failed to retrieve game {src_id}")]
    WriteBack {
        src_id: String,
        #[source]
        source: StoreError,
    },

    /// A resolution task panicked or was torn down before finishing.
    #[error("failed to retrieve game {src_id}: resolution interrupted ({reason})")]
    Interrupted { src_id: String, reason: String },
}

impl FetchFailure {
    pub fn src_id(&self) -> &str {
        match self {
            FetchFailure::Upstream { src_id, .. }
            | FetchFailure::WriteBack { src_id, .. }
            | FetchFailure::Interrupted { src_id, .. } => src_id,
        }
    }
}
