//! Fetch error classification.

use thiserror::Error;

/// Errors surfaced by archive transport and the retry wrapper.
///
/// The split between transient and structural failures drives the retry
/// loop: transient failures consume retry budget, structural ones only
/// advance to the next candidate descriptor.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Archive unreachable, connection reset, 5xx, and the like.
    #[error("Transient archive failure: {0}")]
    Transient(String),

    /// The descriptor names a resource the archive does not have
    /// (stale naming convention, bad parameter combination).
    #[error("Invalid resource descriptor: {0}")]
    InvalidDescriptor(String),

    /// A single transfer exceeded its hard per-descriptor timeout.
    #[error("Fetch timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_) | FetchError::Timeout { .. })
    }
}
