use async_trait::async_trait;

use drip_store::Outcome;

use crate::types::{Challenge, Decision};

/// Pre-session notification collaborator.
///
/// The orchestrator bounds the wait itself; an implementation that never
/// answers simply yields [`Decision::TimedOut`].
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, due_count: usize) -> Decision;
}

/// Test delivery collaborator: renders one challenge and reports how the
/// user responded.
///
/// `challenge.timeout` is the answer window the implementation should
/// enforce (so it can report partial input on elapse). The orchestrator
/// additionally wraps the call in a hard timeout slightly above the window,
/// so a stuck collaborator can never stall the engine.
#[async_trait]
pub trait TestDelivery: Send + Sync {
    async fn deliver(&self, challenge: &Challenge) -> Outcome;
}
