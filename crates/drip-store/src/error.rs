use thiserror::Error;

/// Errors that can occur within the item store and distractor selector.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Item content rejected at the creation boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// No item with the given id exists. Indicates a consistency bug in the
    /// caller's batch, so it is surfaced rather than swallowed.
    #[error("item not found: {id}")]
    NotFound { id: i64 },

    /// The backing storage could not be read or written.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    /// The item population is too small to build a distractor set.
    #[error("insufficient distractor pool: need {needed}, have {available}")]
    InsufficientPool { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, StoreError>;
