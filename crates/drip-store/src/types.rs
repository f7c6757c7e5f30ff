use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque item identifier, assigned by the store and immutable afterwards.
///
/// Backed by the SQLite rowid so creation order doubles as the contextual
/// neighborhood used for distractor sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discrete progress level. Determines test modality and base interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Newly introduced: display-only acknowledgment.
    Intro,
    /// Pick the answer among distractors.
    Recognition,
    /// Reverse direction: pick the prompt given the answer.
    Recall,
    /// Type the answer with a partial hint shown.
    Production,
    /// Long-term material: type the answer, no hint.
    Mastery,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Intro,
        Stage::Recognition,
        Stage::Recall,
        Stage::Production,
        Stage::Mastery,
    ];

    pub fn number(self) -> u8 {
        match self {
            Stage::Intro => 1,
            Stage::Recognition => 2,
            Stage::Recall => 3,
            Stage::Production => 4,
            Stage::Mastery => 5,
        }
    }

    pub fn from_number(n: u8) -> Option<Stage> {
        match n {
            1 => Some(Stage::Intro),
            2 => Some(Stage::Recognition),
            3 => Some(Stage::Recall),
            4 => Some(Stage::Production),
            5 => Some(Stage::Mastery),
            _ => None,
        }
    }

    /// Base review interval for this stage.
    pub fn base_interval(self) -> Duration {
        match self {
            Stage::Intro => Duration::minutes(30),
            Stage::Recognition => Duration::hours(2),
            Stage::Recall => Duration::hours(24),
            Stage::Production => Duration::hours(48),
            Stage::Mastery => Duration::hours(168),
        }
    }

    /// The stage entered on a correct response. Saturates at Mastery.
    pub fn next(self) -> Stage {
        match self {
            Stage::Intro => Stage::Recognition,
            Stage::Recognition => Stage::Recall,
            Stage::Recall => Stage::Production,
            Stage::Production | Stage::Mastery => Stage::Mastery,
        }
    }

    pub fn modality(self) -> Modality {
        match self {
            Stage::Intro => Modality::Acknowledge,
            Stage::Recognition => Modality::MultipleChoice,
            Stage::Recall => Modality::MultipleChoiceReverse,
            Stage::Production => Modality::TypedHinted,
            Stage::Mastery => Modality::Typed,
        }
    }

    /// Typed stages treat a timeout with partial input as an attempt.
    pub fn is_typed(self) -> bool {
        matches!(self, Stage::Production | Stage::Mastery)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// How an item is tested when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Show prompt and answer, wait for acknowledgment.
    Acknowledge,
    /// Prompt shown, answer picked among distractors.
    MultipleChoice,
    /// Answer shown, prompt picked among distractors.
    MultipleChoiceReverse,
    /// Answer typed with a partial hint.
    TypedHinted,
    /// Answer typed, no hint.
    Typed,
}

/// The result of one delivered test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Wrong,
    /// The answer window elapsed. `partial_input` records whether the user
    /// had typed anything: on typed stages that counts as an attempt.
    Timeout { partial_input: bool },
    /// The user dismissed the test explicitly.
    Escape { partial_input: bool },
}

impl Outcome {
    /// Penalty-free timeout, used when marking unshown or declined items.
    pub fn timeout() -> Outcome {
        Outcome::Timeout {
            partial_input: false,
        }
    }

    /// True for Timeout and Escape regardless of partial input.
    pub fn is_walkaway(self) -> bool {
        matches!(self, Outcome::Timeout { .. } | Outcome::Escape { .. })
    }
}

/// A counted attempt: the persisted "most recent outcome" of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attempt {
    Correct,
    Wrong,
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Attempt::Correct => "correct",
            Attempt::Wrong => "wrong",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Attempt {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "correct" => Ok(Attempt::Correct),
            "wrong" => Ok(Attempt::Wrong),
            other => Err(format!("unknown attempt outcome: {other}")),
        }
    }
}

/// Content for a new item. Everything except scheduling state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub prompt: String,
    pub answer: String,
    pub example: Option<String>,
    pub tag: Option<String>,
}

/// A persisted learning item.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    /// Content: immutable after creation.
    pub prompt: String,
    pub answer: String,
    pub example: Option<String>,
    pub tag: Option<String>,
    /// Lifecycle state.
    pub stage: Stage,
    /// Most recent counted attempt, if any. Drives the wrong-answer
    /// priority term across restarts.
    pub last_outcome: Option<Attempt>,
    /// Current review interval. Always strictly positive.
    pub interval: Duration,
    pub created_at: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_due_at: DateTime<Utc>,
    /// Performance counters: monotonically non-decreasing.
    pub review_count: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
}

impl Item {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due_at <= now
    }
}
