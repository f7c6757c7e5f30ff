//! `drip-core`: shared configuration and the clock abstraction.
//!
//! Everything that schedules or scores an item takes its notion of "now"
//! from the [`clock::Clock`] trait rather than the ambient system clock,
//! so the whole engine can be driven deterministically in tests.

pub mod clock;
pub mod config;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DripConfig;
