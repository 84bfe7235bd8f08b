//! Error types for Strata.
//!
//! Every fallible operation in the crate returns [`Result`]; nothing panics
//! across the API boundary. Error codes follow the pattern `STRATA-XXX` for
//! easy debugging.

use thiserror::Error;

/// Result type alias for Strata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Strata operations.
///
/// Each variant includes a descriptive message suitable for end-users.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument (STRATA-001).
    ///
    /// Bad configuration, dimension mismatch, or an index file whose header
    /// conflicts with the runtime options.
    #[error("[STRATA-001] invalid argument: {0}")]
    InvalidArgument(String),

    /// Not found (STRATA-002).
    #[error("[STRATA-002] not found: {0}")]
    NotFound(String),

    /// Already exists (STRATA-003).
    #[error("[STRATA-003] already exists: {0}")]
    AlreadyExists(String),

    /// Resource exhausted (STRATA-004).
    ///
    /// The store reached `max_elements` and no vacant slot is available.
    #[error("[STRATA-004] resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Out of range (STRATA-005).
    ///
    /// A location or level beyond the configured bounds; signals corruption
    /// when it originates from graph traversal.
    #[error("[STRATA-005] out of range: {0}")]
    OutOfRange(String),

    /// Data loss (STRATA-006).
    ///
    /// Short read or magic mismatch while loading an index file.
    #[error("[STRATA-006] data loss: {0}")]
    DataLoss(String),

    /// Internal invariant violation (STRATA-007).
    ///
    /// Self-link, over-capacity neighbor list, or a blank list where one was
    /// expected. The index should be treated as poisoned and rebuilt.
    #[error("[STRATA-007] internal error: {0}")]
    Internal(String),

    /// Unavailable (STRATA-008).
    ///
    /// File not openable, vacant reuse disabled, or an attempt to undelete a
    /// slot that is not deleted.
    #[error("[STRATA-008] unavailable: {0}")]
    Unavailable(String),

    /// IO error (STRATA-009).
    #[error("[STRATA-009] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the stable error code (e.g., "STRATA-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "STRATA-001",
            Self::NotFound(_) => "STRATA-002",
            Self::AlreadyExists(_) => "STRATA-003",
            Self::ResourceExhausted(_) => "STRATA-004",
            Self::OutOfRange(_) => "STRATA-005",
            Self::DataLoss(_) => "STRATA-006",
            Self::Internal(_) => "STRATA-007",
            Self::Unavailable(_) => "STRATA-008",
            Self::Io(_) => "STRATA-009",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// Internal invariant violations and data loss leave the index in an
    /// unusable state; everything else can be retried or handled.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_) | Self::DataLoss(_))
    }
}
