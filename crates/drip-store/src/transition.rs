use chrono::Duration;

use drip_core::config::{MAX_INTERVAL_MINS, MIN_INTERVAL_MINS};

use crate::types::{Attempt, Outcome, Stage};

/// Result of applying an outcome to an item's scheduling state.
///
/// `next_due_at` is always `now + interval`: the penalty-free cases keep
/// the pre-existing interval value, so the reschedule falls out of the same
/// formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub stage: Stage,
    pub interval: Duration,
    /// `Some` when an attempt occurred and counters should move;
    /// `None` for consequence-free exposure (decline, walk-away).
    pub attempt: Option<Attempt>,
}

/// What the outcome amounts to once partial input is accounted for.
enum Effective {
    Correct,
    Wrong,
    /// Timeout or Escape with nothing typed: reschedule, no penalty.
    Walkaway,
}

fn classify(stage: Stage, outcome: Outcome) -> Effective {
    match outcome {
        Outcome::Correct => Effective::Correct,
        Outcome::Wrong => Effective::Wrong,
        Outcome::Timeout { partial_input } | Outcome::Escape { partial_input } => {
            // Partial engagement counts as an attempt, but only on the
            // typed stages: a half-hovered choice button is not evidence.
            if partial_input && stage.is_typed() {
                Effective::Wrong
            } else {
                Effective::Walkaway
            }
        }
    }
}

/// The stage/interval state machine.
///
/// Pure: takes the item's current stage and interval, returns the new pair
/// plus whether counters move. Persistence and timestamps live in the store.
pub fn apply_outcome(stage: Stage, interval: Duration, outcome: Outcome) -> Transition {
    let effective = classify(stage, outcome);

    match (stage, effective) {
        // Stage 1 is consequence-free exposure: acknowledgment advances,
        // anything else just reschedules with the interval untouched.
        (Stage::Intro, Effective::Correct) => Transition {
            stage: Stage::Recognition,
            interval: Stage::Recognition.base_interval(),
            attempt: Some(Attempt::Correct),
        },
        (Stage::Intro, _) => Transition {
            stage,
            interval,
            attempt: None,
        },

        (Stage::Recognition | Stage::Recall, Effective::Correct) => {
            let next = stage.next();
            Transition {
                stage: next,
                interval: next.base_interval() * 2,
                attempt: Some(Attempt::Correct),
            }
        }
        (Stage::Recognition | Stage::Recall, Effective::Wrong) => Transition {
            stage,
            interval: floor(interval / 2),
            attempt: Some(Attempt::Wrong),
        },

        (Stage::Production, Effective::Correct) => Transition {
            stage: Stage::Mastery,
            interval: Stage::Mastery.base_interval(),
            attempt: Some(Attempt::Correct),
        },
        // Penalized but not collapsed: halve, then clamp into [24 h, 48 h].
        (Stage::Production, Effective::Wrong) => Transition {
            stage,
            interval: clamp(
                interval / 2,
                Stage::Recall.base_interval(),
                Stage::Production.base_interval(),
            ),
            attempt: Some(Attempt::Wrong),
        },

        // Mastery grows geometrically on success, capped at 30 days so the
        // value stays meaningful.
        (Stage::Mastery, Effective::Correct) => {
            let grown = Duration::minutes(interval.num_minutes() * 3 / 2);
            Transition {
                stage,
                interval: grown.min(Duration::minutes(MAX_INTERVAL_MINS)),
                attempt: Some(Attempt::Correct),
            }
        }
        // Long-term material: a miss resets to the stage base, never lower.
        (Stage::Mastery, Effective::Wrong) => Transition {
            stage,
            interval: Stage::Mastery.base_interval(),
            attempt: Some(Attempt::Wrong),
        },

        (_, Effective::Walkaway) => Transition {
            stage,
            interval,
            attempt: None,
        },
    }
}

fn floor(interval: Duration) -> Duration {
    interval.max(Duration::minutes(MIN_INTERVAL_MINS))
}

fn clamp(interval: Duration, lo: Duration, hi: Duration) -> Duration {
    interval.max(lo).min(hi)
}
