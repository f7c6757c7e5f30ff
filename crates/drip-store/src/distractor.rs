use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::ItemStore;
use crate::types::ItemId;

/// Ids within this distance of the target count as its contextual
/// neighborhood: items learned around the same time make confusable,
/// therefore useful, wrong options.
const NEIGHBORHOOD: i64 = 10;

/// Which text field the distractors are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Answer texts: the target's prompt is shown (stage 2).
    Forward,
    /// Prompt texts: the target's answer is shown (stage 3).
    Reverse,
}

impl Direction {
    fn column(self) -> &'static str {
        match self {
            Direction::Forward => "answer",
            Direction::Reverse => "prompt",
        }
    }
}

/// Picks plausible wrong options for multiple-choice tests.
pub struct DistractorSelector {
    store: Arc<ItemStore>,
}

impl DistractorSelector {
    pub fn new(store: Arc<ItemStore>) -> Self {
        Self { store }
    }

    /// Return `count` option strings distinct from each other and from the
    /// target's own text (case-insensitive, whitespace-trimmed).
    ///
    /// Neighbors by id-adjacency (±10) are taken first, in id order, so the
    /// preferred pool is deterministic; any shortfall is topped up with a
    /// uniform random sample over the rest of the population. Fails with
    /// `InsufficientPool` when fewer than `count` usable texts exist.
    pub fn select_distractors(
        &self,
        target_id: ItemId,
        count: usize,
        direction: Direction,
    ) -> Result<Vec<String>> {
        let target = self
            .store
            .get_item(target_id)?
            .ok_or(StoreError::NotFound { id: target_id.0 })?;
        let own_text = match direction {
            Direction::Forward => normalize(&target.answer),
            Direction::Reverse => normalize(&target.prompt),
        };

        let mut options: Vec<String> = Vec::with_capacity(count);
        let mut seen: Vec<String> = vec![own_text];
        let column = direction.column();

        let db = self.store.raw().lock().unwrap();

        // Preferred pool: the contextual neighborhood, in id order.
        {
            let mut stmt = db.prepare(&format!(
                "SELECT {column} FROM items
                 WHERE id != ?1 AND id BETWEEN ?2 AND ?3
                 ORDER BY id"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![
                    target_id.0,
                    target_id.0 - NEIGHBORHOOD,
                    target_id.0 + NEIGHBORHOOD
                ],
                |row| row.get::<_, String>(0),
            )?;
            for text in rows {
                let text = text?;
                if options.len() >= count {
                    break;
                }
                push_unique(&mut options, &mut seen, text);
            }
        }

        // Fallback: uniform sample over everything outside the neighborhood.
        if options.len() < count {
            let mut stmt = db.prepare(&format!(
                "SELECT {column} FROM items
                 WHERE id != ?1 AND (id < ?2 OR id > ?3)
                 ORDER BY RANDOM()"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![
                    target_id.0,
                    target_id.0 - NEIGHBORHOOD,
                    target_id.0 + NEIGHBORHOOD
                ],
                |row| row.get::<_, String>(0),
            )?;
            for text in rows {
                if options.len() >= count {
                    break;
                }
                push_unique(&mut options, &mut seen, text?);
            }
        }

        if options.len() < count {
            return Err(StoreError::InsufficientPool {
                needed: count,
                available: options.len(),
            });
        }

        debug!(item_id = %target_id, count, ?direction, "distractors selected");
        Ok(options)
    }
}

fn push_unique(options: &mut Vec<String>, seen: &mut Vec<String>, text: String) {
    let key = normalize(&text);
    if key.is_empty() || seen.contains(&key) {
        return;
    }
    seen.push(key);
    options.push(text.trim().to_string());
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
