use std::time::Duration;

use thiserror::Error;

use drip_store::StoreError;

/// Errors surfaced by the session orchestrator.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A session is already running; concurrent triggers are rejected,
    /// never interleaved.
    #[error("a session is already running")]
    SessionActive,

    /// The store failed mid-batch. Updates applied so far are durable;
    /// `fallback_delay` keeps the trigger loop self-healing.
    #[error("session failed after {applied} applied updates: {source}")]
    SessionFailed {
        applied: usize,
        #[source]
        source: StoreError,
        fallback_delay: Duration,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;
