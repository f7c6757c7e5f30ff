//! `drip-store`: item records, scoring, and the stage/interval state machine.
//!
//! # Overview
//!
//! Items are persisted to a SQLite `items` table. [`store::ItemStore`] owns
//! the connection and applies every mutation; the scoring and transition
//! rules themselves are pure functions in [`scoring`] and [`transition`] so
//! they can be tested without a database.
//!
//! # Stage lifecycle
//!
//! | Stage | Base interval | Test modality                     |
//! |-------|---------------|-----------------------------------|
//! | 1     | 30 min        | display-only acknowledgment       |
//! | 2     | 2 h           | multiple choice (answer)          |
//! | 3     | 24 h          | multiple choice (reverse)         |
//! | 4     | 48 h          | typed answer, partial hint        |
//! | 5     | 168 h         | typed answer, no hint             |

pub mod db;
pub mod distractor;
pub mod error;
pub mod scoring;
pub mod store;
pub mod transition;
pub mod types;

pub use distractor::{Direction, DistractorSelector};
pub use error::{Result, StoreError};
pub use store::ItemStore;
pub use types::{Attempt, Item, ItemId, Modality, NewItem, Outcome, Stage};
