use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use drip_core::clock::Clock;
use drip_core::config::CREATION_GRACE_MINS;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::scoring::priority_score;
use crate::transition::apply_outcome;
use crate::types::{Attempt, Item, ItemId, NewItem, Outcome, Stage};

const ITEM_COLUMNS: &str = "id, prompt, answer, example, tag, stage, last_outcome,
             interval_mins, created_at, last_reviewed_at, next_due_at,
             review_count, correct_count, wrong_count";

/// Thread-safe owner of the persisted item records.
///
/// Wraps a single SQLite connection in a `Mutex`, which serializes writes:
/// at most one update is in flight at a time and readers never observe a
/// partially applied row. All timestamps come from the injected [`Clock`].
pub struct ItemStore {
    db: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl ItemStore {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            clock,
        })
    }

    /// Create a new item at stage 1 with the creation grace delay.
    ///
    /// Prompt and answer must be non-empty after trimming; content is
    /// immutable once stored.
    pub fn create_item(&self, new: &NewItem) -> Result<ItemId> {
        let prompt = new.prompt.trim();
        let answer = new.answer.trim();
        if prompt.is_empty() {
            return Err(StoreError::Validation("prompt must not be empty".into()));
        }
        if answer.is_empty() {
            return Err(StoreError::Validation("answer must not be empty".into()));
        }
        let example = new.example.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let tag = new.tag.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let now = self.clock.now();
        let grace = Duration::minutes(CREATION_GRACE_MINS);

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO items
             (prompt, answer, example, tag, stage, interval_mins, created_at, next_due_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7)",
            rusqlite::params![
                prompt,
                answer,
                example,
                tag,
                grace.num_minutes(),
                to_ts(now),
                to_ts(now + grace),
            ],
        )?;
        let id = ItemId(db.last_insert_rowid());
        info!(item_id = %id, "item created");
        Ok(id)
    }

    /// Fetch one item by id, `None` if it does not exist.
    pub fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let db = self.db.lock().unwrap();
        fetch_item(&db, id)
    }

    /// Up to `limit` items with `next_due_at <= now`, highest priority first.
    ///
    /// Scores are computed here from the live clock and never persisted.
    /// Ties break by oldest `next_due_at`, then lowest id, so the ordering
    /// is a total order for a fixed snapshot. Read-only: no item is
    /// mutated by a due query.
    pub fn get_due_items(&self, limit: usize) -> Result<Vec<Item>> {
        let now = self.clock.now();
        let due: Vec<Item> = {
            let db = self.db.lock().unwrap();
            let mut stmt = db.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items WHERE next_due_at <= ?1"
            ))?;
            let rows = stmt.query_map([to_ts(now)], row_to_item)?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut scored: Vec<(f64, Item)> = due
            .into_iter()
            .map(|item| (priority_score(&item, now), item))
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.next_due_at.cmp(&b.next_due_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);

        debug!(count = scored.len(), limit, "due query");
        Ok(scored.into_iter().map(|(_, item)| item).collect())
    }

    /// Apply a response outcome: run the stage/interval transition, move the
    /// counters if an attempt occurred, and persist the new scheduling state.
    ///
    /// `stage_override` pins the post-transition stage (administrative
    /// correction) and resets the interval to that stage's base, so a moved
    /// item never carries a stale interval.
    ///
    /// Returns `NotFound` when the id does not exist: surfaced, never
    /// swallowed, since it means the caller's batch is inconsistent.
    ///
    /// The connection lock is held across the whole read-modify-write, so
    /// concurrent updates to the same id serialize instead of interleaving
    /// and losing a transition.
    pub fn update_after_response(
        &self,
        id: ItemId,
        outcome: Outcome,
        stage_override: Option<Stage>,
    ) -> Result<Item> {
        let db = self.db.lock().unwrap();
        let mut item = fetch_item(&db, id)?.ok_or(StoreError::NotFound { id: id.0 })?;
        let now = self.clock.now();

        let mut tr = apply_outcome(item.stage, item.interval, outcome);
        if let Some(stage) = stage_override {
            tr.stage = stage;
            tr.interval = stage.base_interval();
        }

        item.stage = tr.stage;
        item.interval = tr.interval;
        item.next_due_at = now + tr.interval;
        if let Some(attempt) = tr.attempt {
            item.review_count += 1;
            match attempt {
                Attempt::Correct => item.correct_count += 1,
                Attempt::Wrong => item.wrong_count += 1,
            }
            item.last_outcome = Some(attempt);
            item.last_reviewed_at = Some(now);
        }

        let rows_changed = db.execute(
            "UPDATE items
             SET stage = ?1, interval_mins = ?2, next_due_at = ?3,
                 review_count = ?4, correct_count = ?5, wrong_count = ?6,
                 last_outcome = ?7, last_reviewed_at = ?8
             WHERE id = ?9",
            rusqlite::params![
                item.stage.number(),
                item.interval.num_minutes(),
                to_ts(item.next_due_at),
                item.review_count,
                item.correct_count,
                item.wrong_count,
                item.last_outcome.map(|a| a.to_string()),
                item.last_reviewed_at.map(to_ts),
                id.0,
            ],
        )?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound { id: id.0 });
        }

        debug!(
            item_id = %id,
            stage = %item.stage,
            interval_mins = item.interval.num_minutes(),
            ?outcome,
            "item rescheduled"
        );
        Ok(item)
    }

    /// Number of items due right now.
    pub fn due_count(&self) -> Result<u64> {
        let now = to_ts(self.clock.now());
        let db = self.db.lock().unwrap();
        let count = db.query_row(
            "SELECT COUNT(*) FROM items WHERE next_due_at <= ?1",
            [now],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(count)
    }

    /// Earliest `next_due_at` strictly in the future, if any item has one.
    pub fn earliest_future_due(&self) -> Result<Option<DateTime<Utc>>> {
        let now = to_ts(self.clock.now());
        let db = self.db.lock().unwrap();
        let ts: Option<String> = db.query_row(
            "SELECT MIN(next_due_at) FROM items WHERE next_due_at > ?1",
            [now],
            |row| row.get(0),
        )?;
        match ts {
            Some(s) => Ok(Some(parse_ts(&s).map_err(|e| {
                StoreError::Validation(format!("bad timestamp in store: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn raw(&self) -> &Mutex<Connection> {
        &self.db
    }
}

/// Serialize a timestamp to the canonical stored form.
///
/// Second precision with a `Z` suffix keeps the strings fixed-width so SQL
/// string comparison matches chronological order.
fn to_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(s: &str) -> chrono::ParseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc))
}

/// Fetch one row by id on an already-locked connection.
fn fetch_item(db: &Connection, id: ItemId) -> Result<Option<Item>> {
    match db.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
        [id.0],
        row_to_item,
    ) {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Unavailable(e)),
    }
}

/// Map a SQLite row (in `ITEM_COLUMNS` order) to an `Item`.
fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let stage_num: u8 = row.get(5)?;
    let stage = Stage::from_number(stage_num).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Integer,
            format!("stage {stage_num} out of range").into(),
        )
    })?;
    let last_outcome: Option<String> = row.get(6)?;

    Ok(Item {
        id: ItemId(row.get(0)?),
        prompt: row.get(1)?,
        answer: row.get(2)?,
        example: row.get(3)?,
        tag: row.get(4)?,
        stage,
        last_outcome: last_outcome.and_then(|s| s.parse().ok()),
        interval: Duration::minutes(row.get::<_, i64>(7)?),
        created_at: get_ts(row, 8)?,
        last_reviewed_at: get_opt_ts(row, 9)?,
        next_due_at: get_ts(row, 10)?,
        review_count: row.get(11)?,
        correct_count: row.get(12)?,
        wrong_count: row.get(13)?,
    })
}

fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_ts(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn get_opt_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(s) => parse_ts(&s)
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use drip_core::clock::ManualClock;

    fn store_at(start: DateTime<Utc>) -> (ItemStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let conn = Connection::open_in_memory().unwrap();
        let store = ItemStore::new(conn, clock.clone()).unwrap();
        (store, clock)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn new_item(prompt: &str, answer: &str) -> NewItem {
        NewItem {
            prompt: prompt.into(),
            answer: answer.into(),
            example: None,
            tag: None,
        }
    }

    #[test]
    fn create_rejects_blank_content() {
        let (store, _) = store_at(t0());
        let err = store.create_item(&new_item("  ", "meaning")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        let err = store.create_item(&new_item("word", "\t\n")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn create_assigns_stage_one_and_grace_delay() {
        let (store, _) = store_at(t0());
        let id = store.create_item(&new_item("serendipity", "a happy accident")).unwrap();
        let item = store.get_item(id).unwrap().unwrap();
        assert_eq!(item.stage, Stage::Intro);
        assert_eq!(item.interval, Duration::minutes(30));
        assert_eq!(item.next_due_at, t0() + Duration::minutes(30));
        assert_eq!(item.review_count, 0);
        assert_eq!(item.last_reviewed_at, None);
    }

    #[test]
    fn create_trims_content() {
        let (store, _) = store_at(t0());
        let id = store
            .create_item(&NewItem {
                prompt: "  gossamer  ".into(),
                answer: " thin and delicate ".into(),
                example: Some("   ".into()),
                tag: Some(" fabric ".into()),
            })
            .unwrap();
        let item = store.get_item(id).unwrap().unwrap();
        assert_eq!(item.prompt, "gossamer");
        assert_eq!(item.answer, "thin and delicate");
        assert_eq!(item.example, None);
        assert_eq!(item.tag, Some("fabric".into()));
    }

    #[test]
    fn get_item_returns_none_for_unknown_id() {
        let (store, _) = store_at(t0());
        assert!(store.get_item(ItemId(999)).unwrap().is_none());
    }

    #[test]
    fn due_query_respects_limit_and_due_time() {
        let (store, clock) = store_at(t0());
        for i in 0..8 {
            store
                .create_item(&new_item(&format!("w{i}"), &format!("m{i}")))
                .unwrap();
        }
        // nothing is due inside the grace window
        assert!(store.get_due_items(10).unwrap().is_empty());

        clock.advance(Duration::minutes(31));
        let due = store.get_due_items(5).unwrap();
        assert_eq!(due.len(), 5);
        let now = clock.now();
        assert!(due.iter().all(|it| it.next_due_at <= now));
    }

    #[test]
    fn due_query_orders_by_priority_then_oldest_due() {
        let (store, clock) = store_at(t0());
        let a = store.create_item(&new_item("a", "ma")).unwrap();
        let b = store.create_item(&new_item("b", "mb")).unwrap();
        clock.advance(Duration::minutes(31));

        // advance `a` to Recognition so it scores below the stage-1 item
        store.update_after_response(a, Outcome::Correct, None).unwrap();
        clock.advance(Duration::hours(3));

        let due = store.get_due_items(10).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, b, "stage-1 never-reviewed item ranks first");
        assert_eq!(due[1].id, a);
    }

    #[test]
    fn due_query_does_not_mutate() {
        let (store, clock) = store_at(t0());
        let id = store.create_item(&new_item("w", "m")).unwrap();
        clock.advance(Duration::hours(1));
        let before = store.get_item(id).unwrap().unwrap();
        store.get_due_items(5).unwrap();
        store.get_due_items(5).unwrap();
        let after = store.get_item(id).unwrap().unwrap();
        assert_eq!(before.next_due_at, after.next_due_at);
        assert_eq!(before.review_count, after.review_count);
    }

    #[test]
    fn recognition_correct_scenario() {
        // stage 2, interval 2 h, Correct → stage 3, interval 48 h, due now+48 h
        let (store, clock) = store_at(t0());
        let id = store.create_item(&new_item("w", "m")).unwrap();
        clock.advance(Duration::minutes(31));
        store.update_after_response(id, Outcome::Correct, None).unwrap();

        clock.advance(Duration::hours(3));
        let now = clock.now();
        let item = store.update_after_response(id, Outcome::Correct, None).unwrap();
        assert_eq!(item.stage, Stage::Recall);
        assert_eq!(item.interval, Duration::hours(48));
        assert_eq!(item.next_due_at, now + Duration::hours(48));
        assert_eq!(item.review_count, 2);
        assert_eq!(item.correct_count, 2);
    }

    #[test]
    fn intro_timeout_reschedules_without_counting() {
        let (store, clock) = store_at(t0());
        let id = store.create_item(&new_item("w", "m")).unwrap();
        clock.advance(Duration::hours(2));
        let now = clock.now();

        let item = store
            .update_after_response(id, Outcome::timeout(), None)
            .unwrap();
        assert_eq!(item.stage, Stage::Intro);
        assert_eq!(item.next_due_at, now + Duration::minutes(30));
        assert_eq!(item.review_count, 0);
        assert_eq!(item.correct_count, 0);
        assert_eq!(item.wrong_count, 0);
        assert_eq!(item.last_reviewed_at, None);
    }

    #[test]
    fn wrong_marks_last_outcome_for_priority() {
        let (store, clock) = store_at(t0());
        let id = store.create_item(&new_item("w", "m")).unwrap();
        clock.advance(Duration::minutes(31));
        store.update_after_response(id, Outcome::Correct, None).unwrap();
        clock.advance(Duration::hours(3));

        let item = store.update_after_response(id, Outcome::Wrong, None).unwrap();
        assert_eq!(item.last_outcome, Some(Attempt::Wrong));
        assert_eq!(item.wrong_count, 1);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let (store, _) = store_at(t0());
        let err = store
            .update_after_response(ItemId(42), Outcome::Correct, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: 42 }));
    }

    #[test]
    fn stage_override_pins_stage_and_resets_interval() {
        let (store, clock) = store_at(t0());
        let id = store.create_item(&new_item("w", "m")).unwrap();
        clock.advance(Duration::minutes(31));

        let item = store
            .update_after_response(id, Outcome::Correct, Some(Stage::Production))
            .unwrap();
        assert_eq!(item.stage, Stage::Production);
        assert_eq!(item.interval, Stage::Production.base_interval());
    }

    #[test]
    fn concurrent_updates_to_one_item_all_count() {
        // read-modify-write must hold the lock end to end, otherwise two
        // updaters interleave and one transition is silently lost
        let (store, clock) = store_at(t0());
        let id = store.create_item(&new_item("w", "m")).unwrap();
        clock.advance(Duration::minutes(31));
        // move past the consequence-free intro stage so every Wrong counts
        store.update_after_response(id, Outcome::Correct, None).unwrap();
        clock.advance(Duration::hours(3));

        let store = Arc::new(store);
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        store.update_after_response(id, Outcome::Wrong, None).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let item = store.get_item(id).unwrap().unwrap();
        assert_eq!(item.review_count, 1001);
        assert_eq!(item.wrong_count, 1000);
        assert_eq!(item.correct_count, 1);
    }

    #[test]
    fn due_count_and_earliest_future_due() {
        let (store, clock) = store_at(t0());
        assert_eq!(store.due_count().unwrap(), 0);
        assert_eq!(store.earliest_future_due().unwrap(), None);

        store.create_item(&new_item("w", "m")).unwrap();
        assert_eq!(store.due_count().unwrap(), 0);
        assert_eq!(
            store.earliest_future_due().unwrap(),
            Some(t0() + Duration::minutes(30))
        );

        clock.advance(Duration::hours(1));
        assert_eq!(store.due_count().unwrap(), 1);
        assert_eq!(store.earliest_future_due().unwrap(), None);
    }
}
