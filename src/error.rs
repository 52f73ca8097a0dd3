//! Error taxonomy for the recommendation engine.
//!
//! Lookups that can legitimately miss (catalog queries, neighbor searches,
//! queue mutations) return `Option` or an empty collection instead of an
//! error. Only the conditions below are ever surfaced to callers.

use std::fmt;

/// What kind of entity a [`RecommendError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Track,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Track => write!(f, "Track"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("Training already in progress")]
    ConcurrencyConflict,

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Malformed import: {0}")]
    MalformedImport(String),
}

impl RecommendError {
    pub fn track_not_found(id: impl Into<String>) -> Self {
        RecommendError::NotFound {
            kind: EntityKind::Track,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RecommendError::NotFound { .. })
    }
}

impl From<rusqlite::Error> for RecommendError {
    fn from(err: rusqlite::Error) -> Self {
        RecommendError::PersistenceFailure(err.to_string())
    }
}

impl From<std::io::Error> for RecommendError {
    fn from(err: std::io::Error) -> Self {
        RecommendError::PersistenceFailure(err.to_string())
    }
}
