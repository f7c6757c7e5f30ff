use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// How long a freshly created item waits before its first review.
pub const CREATION_GRACE_MINS: i64 = 30;
/// Lower bound for any computed interval: prevents runaway shrink.
pub const MIN_INTERVAL_MINS: i64 = 15;
/// Ceiling for stage-5 geometric growth (30 days).
pub const MAX_INTERVAL_MINS: i64 = 30 * 24 * 60;

/// Top-level config (drip.toml + DRIP_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DripConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub wake: WakeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Session-level knobs: batch size, notification wait, per-stage test timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Maximum items pulled into one session.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// How long the notification waits for an accept/decline (seconds).
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,
    /// Distractor options per multiple-choice test.
    #[serde(default = "default_distractor_count")]
    pub distractor_count: usize,
    /// Per-stage answer timeouts (seconds), independently settable.
    #[serde(default = "default_stage1_timeout")]
    pub stage1_timeout_secs: u64,
    #[serde(default = "default_stage2_timeout")]
    pub stage2_timeout_secs: u64,
    #[serde(default = "default_stage3_timeout")]
    pub stage3_timeout_secs: u64,
    #[serde(default = "default_stage4_timeout")]
    pub stage4_timeout_secs: u64,
    #[serde(default = "default_stage5_timeout")]
    pub stage5_timeout_secs: u64,
}

impl ReviewConfig {
    /// Answer timeout for a stage number (1..=5).
    ///
    /// Out-of-range stages fall back to the stage-1 value; the store never
    /// produces one, but the mapping should not panic on caller bugs.
    pub fn timeout_for_stage(&self, stage: u8) -> u64 {
        match stage {
            2 => self.stage2_timeout_secs,
            3 => self.stage3_timeout_secs,
            4 => self.stage4_timeout_secs,
            5 => self.stage5_timeout_secs,
            _ => self.stage1_timeout_secs,
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            notify_timeout_secs: default_notify_timeout(),
            distractor_count: default_distractor_count(),
            stage1_timeout_secs: default_stage1_timeout(),
            stage2_timeout_secs: default_stage2_timeout(),
            stage3_timeout_secs: default_stage3_timeout(),
            stage4_timeout_secs: default_stage4_timeout(),
            stage5_timeout_secs: default_stage5_timeout(),
        }
    }
}

/// Next-wake computation bounds for the trigger loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeConfig {
    /// Floor for any returned delay (seconds): avoids busy-looping.
    #[serde(default = "default_wake_floor")]
    pub floor_secs: u64,
    /// Cap when nothing is due for a long time (seconds).
    #[serde(default = "default_wake_cap")]
    pub cap_secs: u64,
    /// Recheck delay when a small batch is already due (seconds).
    #[serde(default = "default_wake_due_small")]
    pub due_small_secs: u64,
    /// Recheck delay when many items are due (seconds).
    #[serde(default = "default_wake_due_large")]
    pub due_large_secs: u64,
    /// Fallback delay after a failed session (seconds).
    #[serde(default = "default_wake_retry")]
    pub retry_secs: u64,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            floor_secs: default_wake_floor(),
            cap_secs: default_wake_cap(),
            due_small_secs: default_wake_due_small(),
            due_large_secs: default_wake_due_large(),
            retry_secs: default_wake_retry(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.drip/drip.db", home)
}
fn default_batch_limit() -> usize {
    5
}
fn default_notify_timeout() -> u64 {
    5
}
fn default_distractor_count() -> usize {
    3
}
fn default_stage1_timeout() -> u64 {
    20
}
fn default_stage2_timeout() -> u64 {
    30
}
fn default_stage3_timeout() -> u64 {
    20
}
fn default_stage4_timeout() -> u64 {
    30
}
fn default_stage5_timeout() -> u64 {
    30
}
fn default_wake_floor() -> u64 {
    60
}
fn default_wake_cap() -> u64 {
    3600
}
fn default_wake_due_small() -> u64 {
    5 * 60
}
fn default_wake_due_large() -> u64 {
    3 * 60
}
fn default_wake_retry() -> u64 {
    5 * 60
}

impl DripConfig {
    /// Load config from a TOML file with DRIP_* env var overrides.
    ///
    /// Checks the explicit path first, then ~/.drip/drip.toml. A missing
    /// file is fine: every field has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self, figment::Error> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DRIP_").split("_"))
            .extract()
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.drip/drip.toml", home)
}
