//! `drip-session`: the review-session orchestrator.
//!
//! One session is a bounded cycle: fetch due items, ask the notification
//! collaborator for a go/no-go, hand items one at a time to the test
//! delivery collaborator, apply each outcome immediately, and finish with
//! the delay until the next due check. The collaborators are trait objects
//! so the engine never touches a pixel or a keyboard itself.
//!
//! State machine per session:
//!
//! `Idle → NotifyPending → {Declined | NotifyTimedOut
//!       | (accepted) Running → Completed} → Idle`

pub mod error;
pub mod orchestrator;
pub mod traits;
pub mod types;

pub use error::{Result, SessionError};
pub use orchestrator::SessionOrchestrator;
pub use traits::{Notifier, TestDelivery};
pub use types::{Challenge, Decision, ItemView, SessionOutcome, SessionState, SessionStats, TriggerReason};
