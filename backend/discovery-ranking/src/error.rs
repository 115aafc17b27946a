//! Error types for the discovery ranking engine

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the ranking pipeline.
///
/// `Clone` so that one failed cache fill can be handed to every request
/// that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum RankingError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Candidate source failed: {0}")]
    CandidateSource(String),

    #[error("Post {0} is not in the candidate set")]
    PostNotFound(Uuid),

    #[error(
        "Score breakdown mismatch for post {post_id}: final={final_score}, recomputed={recomputed}"
    )]
    BreakdownMismatch {
        post_id: Uuid,
        final_score: f64,
        recomputed: f64,
    },

    #[error("Ranking request timed out after {0}ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RankingError>;
