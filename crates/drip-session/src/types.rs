use std::time::Duration;

use serde::{Deserialize, Serialize};

use drip_store::{Item, ItemId, Modality, Stage};

/// Why a session was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// The wake timer elapsed.
    Periodic,
    /// Explicit user request.
    Manual,
}

/// The notification collaborator's go/no-go answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Decline,
    /// The bounded wait elapsed without an answer.
    TimedOut,
}

/// Orchestrator state, observable between calls.
///
/// The terminal states are passed through while the session winds down
/// (the decline sweep, the completion bookkeeping) and collapse back to
/// `Idle` before the session call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    NotifyPending,
    /// The notification was declined; the batch is being swept with
    /// penalty-free timeouts.
    Declined,
    /// The notification wait elapsed unanswered; swept like a decline.
    NotifyTimedOut,
    Running,
    Completed,
}

/// What the delivery collaborator gets to render for one item.
///
/// Carries the answer so the collaborator can judge typed input; the
/// engine still owns every scheduling consequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: ItemId,
    pub prompt: String,
    pub answer: String,
    pub example: Option<String>,
    pub stage: Stage,
    pub modality: Modality,
}

impl ItemView {
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: item.id,
            prompt: item.prompt.clone(),
            answer: item.answer.clone(),
            example: item.example.clone(),
            stage: item.stage,
            modality: item.stage.modality(),
        }
    }

    /// Partial hint for the hinted typed stage: first character shown,
    /// the rest masked.
    pub fn hint(&self) -> String {
        let mut chars = self.answer.trim().chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut out = String::from(first);
                for c in chars {
                    out.push(if c.is_whitespace() { ' ' } else { '_' });
                }
                out
            }
        }
    }
}

/// One prepared test, ready for delivery.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub view: ItemView,
    /// Wrong options for the multiple-choice modalities; empty otherwise
    /// (or when the pool could not fill the requested count).
    pub distractors: Vec<String>,
    /// Answer window the collaborator should enforce.
    pub timeout: Duration,
}

/// Per-session tallies, mirrored into the completion log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub timeouts: usize,
    pub escapes: usize,
}

impl SessionStats {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

/// Terminal result of one session request. Always produced: the caller
/// never hangs waiting for a session that quietly died.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Number of items whose updates were applied.
    pub applied_count: usize,
    /// How long the trigger owner should sleep before the next due check.
    pub next_wake_delay: Duration,
    pub stats: SessionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_masks_all_but_first_character() {
        let view = ItemView {
            id: ItemId(1),
            prompt: "serendipity".into(),
            answer: "happy accident".into(),
            example: None,
            stage: Stage::Production,
            modality: Modality::TypedHinted,
        };
        assert_eq!(view.hint(), "h____ ________");
    }

    #[test]
    fn accuracy_handles_empty_session() {
        assert_eq!(SessionStats::default().accuracy(), 0.0);
        let stats = SessionStats {
            total: 4,
            correct: 3,
            wrong: 1,
            timeouts: 0,
            escapes: 0,
        };
        assert_eq!(stats.accuracy(), 75.0);
    }
}
