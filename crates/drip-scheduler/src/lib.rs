//! `drip-scheduler`: due ordering and next-wake computation.
//!
//! The scheduler reads item state through the store and answers two
//! questions for the trigger loop: which items should be reviewed now
//! (delegating the priority ordering to the store), and how long to sleep
//! before checking again. It never mutates anything.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use drip_store::{Item, ItemStore, Result};

/// Above this many due items the recheck cadence tightens.
const LARGE_BATCH: u64 = 5;

pub struct Scheduler {
    store: Arc<ItemStore>,
    cfg: drip_core::config::WakeConfig,
}

impl Scheduler {
    pub fn new(store: Arc<ItemStore>, cfg: drip_core::config::WakeConfig) -> Self {
        Self { store, cfg }
    }

    /// Due items in priority order, at most `limit`.
    pub fn due_items(&self, limit: usize) -> Result<Vec<Item>> {
        self.store.get_due_items(limit)
    }

    /// How long the trigger loop should sleep before the next due check.
    ///
    /// Items already due now get a short recheck delay (shorter still when
    /// the backlog is large); otherwise the delay runs to the earliest
    /// future `next_due_at`. The result is always within `[floor, cap]`:
    /// the floor prevents busy-looping, the cap bounds the longest nap.
    pub fn next_wake_delay(&self) -> Result<Duration> {
        let due = self.store.due_count()?;
        let secs = if due > LARGE_BATCH {
            self.cfg.due_large_secs
        } else if due > 0 {
            self.cfg.due_small_secs
        } else {
            match self.store.earliest_future_due()? {
                Some(at) => {
                    let now = self.store.clock().now();
                    (at - now).num_seconds().max(0) as u64
                }
                // empty collection: nothing to wake for, nap until the cap
                None => self.cfg.cap_secs,
            }
        };
        let bounded = secs.clamp(self.cfg.floor_secs, self.cfg.cap_secs);
        debug!(due, delay_secs = bounded, "next wake computed");
        Ok(Duration::from_secs(bounded))
    }

    /// Fixed fallback delay after a failed session, so the trigger loop
    /// self-heals instead of stalling.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.cfg.retry_secs.max(self.cfg.floor_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use drip_core::clock::ManualClock;
    use drip_core::config::WakeConfig;
    use drip_store::NewItem;
    use rusqlite::Connection;

    fn setup() -> (Scheduler, Arc<ItemStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(
            ItemStore::new(Connection::open_in_memory().unwrap(), clock.clone()).unwrap(),
        );
        let sched = Scheduler::new(store.clone(), WakeConfig::default());
        (sched, store, clock)
    }

    fn add(store: &ItemStore, i: usize) {
        store
            .create_item(&NewItem {
                prompt: format!("w{i}"),
                answer: format!("m{i}"),
                example: None,
                tag: None,
            })
            .unwrap();
    }

    #[test]
    fn empty_store_naps_until_cap() {
        let (sched, _, _) = setup();
        assert_eq!(sched.next_wake_delay().unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn upcoming_item_sets_the_delay() {
        let (sched, store, _) = setup();
        add(&store, 0); // due in 30 minutes
        assert_eq!(
            sched.next_wake_delay().unwrap(),
            Duration::from_secs(30 * 60)
        );
    }

    #[test]
    fn imminent_item_is_floored() {
        let (sched, store, clock) = setup();
        add(&store, 0);
        clock.advance(chrono::Duration::minutes(30) - chrono::Duration::seconds(10));
        // ten seconds out, but the floor is one minute
        assert_eq!(sched.next_wake_delay().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn due_backlog_uses_short_recheck() {
        let (sched, store, clock) = setup();
        for i in 0..3 {
            add(&store, i);
        }
        clock.advance(chrono::Duration::hours(1));
        assert_eq!(sched.next_wake_delay().unwrap(), Duration::from_secs(5 * 60));

        for i in 3..9 {
            add(&store, i);
        }
        clock.advance(chrono::Duration::hours(1));
        assert_eq!(sched.next_wake_delay().unwrap(), Duration::from_secs(3 * 60));
    }

    #[test]
    fn retry_delay_never_drops_below_floor() {
        let (_, store, _) = setup();
        let sched = Scheduler::new(
            store,
            WakeConfig {
                retry_secs: 1,
                ..WakeConfig::default()
            },
        );
        assert_eq!(sched.retry_delay(), Duration::from_secs(60));
    }
}
