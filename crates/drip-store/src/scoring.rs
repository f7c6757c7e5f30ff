use chrono::{DateTime, Utc};

use crate::types::{Attempt, Item, Stage};

/// Overdue bonus accrues at this rate per hour past due.
const OVERDUE_PER_HOUR: f64 = 5.0;
/// Cap on the overdue bonus so long-overdue items cannot starve fresh ones.
const OVERDUE_CAP: f64 = 50.0;
/// Re-surface recent mistakes sooner.
const WRONG_BONUS: f64 = 30.0;
/// Never-reviewed items get met promptly.
const NEW_BONUS: f64 = 20.0;

fn stage_base(stage: Stage) -> f64 {
    match stage {
        Stage::Intro => 100.0,
        Stage::Recognition => 80.0,
        Stage::Recall => 60.0,
        Stage::Production => 50.0,
        Stage::Mastery => 40.0,
    }
}

/// Derived ranking value used to order due items.
///
/// Recomputed on every due query: never read back from storage, so a stale
/// persisted value can never drive ordering.
pub fn priority_score(item: &Item, now: DateTime<Utc>) -> f64 {
    let overdue_hours = (now - item.next_due_at).num_seconds().max(0) as f64 / 3600.0;
    let overdue_bonus = (overdue_hours * OVERDUE_PER_HOUR).min(OVERDUE_CAP);

    let wrong_bonus = if item.last_outcome == Some(Attempt::Wrong) {
        WRONG_BONUS
    } else {
        0.0
    };

    let new_bonus = if item.review_count == 0 { NEW_BONUS } else { 0.0 };

    stage_base(item.stage) + overdue_bonus + wrong_bonus + new_bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn item(stage: Stage) -> Item {
        let t = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        Item {
            id: crate::types::ItemId(1),
            prompt: "ephemeral".into(),
            answer: "lasting a very short time".into(),
            example: None,
            tag: None,
            stage,
            last_outcome: None,
            interval: stage.base_interval(),
            created_at: t,
            last_reviewed_at: None,
            next_due_at: t,
            review_count: 1,
            correct_count: 1,
            wrong_count: 0,
        }
    }

    #[test]
    fn base_score_decreases_with_stage() {
        let now = item(Stage::Intro).next_due_at;
        let scores: Vec<f64> = Stage::ALL
            .iter()
            .map(|&s| {
                let mut it = item(s);
                it.review_count = 1; // suppress the new bonus
                priority_score(&it, now)
            })
            .collect();
        for pair in scores.windows(2) {
            assert!(pair[0] > pair[1], "earlier stages must score higher");
        }
    }

    #[test]
    fn overdue_bonus_is_capped() {
        let mut it = item(Stage::Recall);
        let now = it.next_due_at + Duration::days(30);
        let score = priority_score(&it, now);
        assert_eq!(score, 60.0 + 50.0);

        // an hour overdue accrues 5 points, uncapped territory
        it.next_due_at = now - Duration::hours(1);
        assert_eq!(priority_score(&it, now), 60.0 + 5.0);
    }

    #[test]
    fn not_yet_due_earns_no_overdue_bonus() {
        let it = item(Stage::Recall);
        let now = it.next_due_at - Duration::hours(3);
        assert_eq!(priority_score(&it, now), 60.0);
    }

    #[test]
    fn wrong_and_new_bonuses_apply() {
        let now = item(Stage::Recognition).next_due_at;

        let mut wrong = item(Stage::Recognition);
        wrong.last_outcome = Some(Attempt::Wrong);
        assert_eq!(priority_score(&wrong, now), 80.0 + 30.0);

        let mut fresh = item(Stage::Intro);
        fresh.review_count = 0;
        assert_eq!(priority_score(&fresh, now), 100.0 + 20.0);
    }
}
