//! Error type for the few recoverable failures in this crate.
//!
//! Lookups that miss are not errors: they report `false`, `None` or the end
//! cursor. Only storage growth that the caller asked to be fallible ends up
//! here.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by fallible container operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DequeError {
    /// The requested capacity does not fit in `usize` once rounded up to a
    /// power of two.
    #[error("capacity overflow: {requested} elements requested")]
    CapacityOverflow { requested: usize },

    /// The allocator refused the new buffer. The container is unchanged.
    #[error("allocation failed while growing storage: {0}")]
    Allocation(#[from] TryReserveError),
}

/// Result alias for fallible container operations.
pub type Result<T> = std::result::Result<T, DequeError>;
