//! Persistence seam shared by every ledger.
//!
//! The engine never talks to a database directly; each aggregate has a narrow repository
//! trait next to its domain types and all of them report failures through
//! [`RepositoryError`]. Writes that mutate existing records are conditional on the
//! record's `version` so concurrent writers cannot lose updates.

pub mod memory;

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("stale write (expected version {expected:?}, stored {actual:?})")]
    VersionMismatch {
        expected: Option<u64>,
        actual: Option<u64>,
    },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, Self::VersionMismatch { .. })
    }
}
