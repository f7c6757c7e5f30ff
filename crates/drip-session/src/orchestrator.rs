use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use drip_core::config::ReviewConfig;
use drip_scheduler::Scheduler;
use drip_store::{
    Direction, DistractorSelector, Item, ItemStore, Modality, Outcome, StoreError,
};

use crate::error::{Result, SessionError};
use crate::traits::{Notifier, TestDelivery};
use crate::types::{
    Challenge, Decision, ItemView, SessionOutcome, SessionState, SessionStats, TriggerReason,
};

/// Slack above the per-stage answer window before the engine abandons a
/// delivery call. Keeps a stuck collaborator from stalling the session.
const DELIVERY_GRACE: Duration = Duration::from_secs(5);

/// Sequences one review session at a time: fetch due items, notify, deliver
/// tests, apply each result immediately, compute the next wake delay.
pub struct SessionOrchestrator {
    store: Arc<ItemStore>,
    scheduler: Arc<Scheduler>,
    selector: DistractorSelector,
    notifier: Arc<dyn Notifier>,
    delivery: Arc<dyn TestDelivery>,
    review: ReviewConfig,
    /// External abort signal, honored between items.
    abort: watch::Receiver<bool>,
    state: Mutex<SessionState>,
    /// Mutual exclusion: at most one session runs at a time.
    running: tokio::sync::Mutex<()>,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<ItemStore>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
        delivery: Arc<dyn TestDelivery>,
        review: ReviewConfig,
        abort: watch::Receiver<bool>,
    ) -> Self {
        Self {
            selector: DistractorSelector::new(store.clone()),
            store,
            scheduler,
            notifier,
            delivery,
            review,
            abort,
            state: Mutex::new(SessionState::Idle),
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Current orchestrator state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Run one full session. Returns `SessionActive` if another session is
    /// in flight; concurrent triggers are rejected, never interleaved.
    pub async fn run_session(&self, reason: TriggerReason) -> Result<SessionOutcome> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SessionError::SessionActive)?;

        let session_id = Uuid::new_v4();
        info!(%session_id, ?reason, "session requested");

        let result = self.run_locked(session_id).await;
        self.set_state(SessionState::Idle);
        result
    }

    async fn run_locked(&self, session_id: Uuid) -> Result<SessionOutcome> {
        // A due-check failure degrades to "nothing due" but is escalated in
        // the log and pushes the loop onto the retry cadence.
        let items = match self.scheduler.due_items(self.review.batch_limit) {
            Ok(items) => items,
            Err(e) => {
                error!(%session_id, error = %e, "due check failed; degrading to zero due");
                return Ok(SessionOutcome {
                    applied_count: 0,
                    next_wake_delay: self.scheduler.retry_delay(),
                    stats: SessionStats::default(),
                });
            }
        };

        // Zero due: short-circuit straight back to Idle, no notification.
        if items.is_empty() {
            debug!(%session_id, "nothing due");
            return Ok(SessionOutcome {
                applied_count: 0,
                next_wake_delay: self.next_wake(),
                stats: SessionStats::default(),
            });
        }

        self.set_state(SessionState::NotifyPending);
        let wait = Duration::from_secs(self.review.notify_timeout_secs);
        let decision = match timeout(wait, self.notifier.notify(items.len())).await {
            Ok(d) => d,
            Err(_) => Decision::TimedOut,
        };
        info!(%session_id, due = items.len(), ?decision, "notification answered");

        if decision != Decision::Accept {
            self.set_state(match decision {
                Decision::Decline => SessionState::Declined,
                _ => SessionState::NotifyTimedOut,
            });
            // Declining must not penalize: every item is marked with a
            // penalty-free timeout, which only reschedules it.
            let mut stats = SessionStats {
                total: items.len(),
                ..SessionStats::default()
            };
            let applied = self.mark_timeout(&items, 0, 0, &mut stats)?;
            return Ok(SessionOutcome {
                applied_count: applied,
                next_wake_delay: self.next_wake(),
                stats,
            });
        }

        self.set_state(SessionState::Running);
        let outcome = self.deliver_batch(session_id, &items).await?;
        self.set_state(SessionState::Completed);
        info!(
            %session_id,
            applied = outcome.applied_count,
            correct = outcome.stats.correct,
            wrong = outcome.stats.wrong,
            timeouts = outcome.stats.timeouts,
            accuracy = outcome.stats.accuracy(),
            "session completed"
        );
        Ok(outcome)
    }

    /// Hand items to the delivery collaborator one at a time, applying each
    /// result immediately so a crash loses at most the in-flight item.
    async fn deliver_batch(&self, session_id: Uuid, items: &[Item]) -> Result<SessionOutcome> {
        let mut stats = SessionStats {
            total: items.len(),
            ..SessionStats::default()
        };
        let mut applied = 0usize;

        for (idx, item) in items.iter().enumerate() {
            // Abort is honored between items, never mid-item.
            if *self.abort.borrow() {
                warn!(%session_id, remaining = items.len() - idx, "session aborted");
                applied = self
                    .mark_timeout(items, idx, applied, &mut stats)
                    .map(|n| applied + n)?;
                break;
            }

            let challenge = self.prepare(item, applied)?;
            let window = challenge.timeout;
            let outcome = match timeout(window + DELIVERY_GRACE, self.delivery.deliver(&challenge)).await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%session_id, item_id = %item.id, "delivery stalled past its window");
                    Outcome::timeout()
                }
            };

            self.apply(item, outcome, applied)?;
            applied += 1;
            tally(&mut stats, outcome);

            // An unengaged user should not face a cascade of further tests.
            if outcome.is_walkaway() {
                debug!(%session_id, item_id = %item.id, "early exit after walk-away");
                applied = self
                    .mark_timeout(items, idx + 1, applied, &mut stats)
                    .map(|n| applied + n)?;
                break;
            }
        }

        Ok(SessionOutcome {
            applied_count: applied,
            next_wake_delay: self.next_wake(),
            stats,
        })
    }

    /// Build the challenge for one item, degrading to fewer distractors when
    /// the pool cannot fill the requested count.
    fn prepare(&self, item: &Item, applied: usize) -> Result<Challenge> {
        let view = ItemView::from_item(item);
        let direction = match view.modality {
            Modality::MultipleChoice => Some(Direction::Forward),
            Modality::MultipleChoiceReverse => Some(Direction::Reverse),
            _ => None,
        };

        let distractors = match direction {
            None => Vec::new(),
            Some(direction) => {
                match self
                    .selector
                    .select_distractors(item.id, self.review.distractor_count, direction)
                {
                    Ok(v) => v,
                    Err(StoreError::InsufficientPool { available, .. }) => {
                        warn!(item_id = %item.id, available, "distractor pool short; degrading");
                        if available == 0 {
                            Vec::new()
                        } else {
                            self.selector
                                .select_distractors(item.id, available, direction)
                                .map_err(|e| self.failed(applied, e))?
                        }
                    }
                    Err(e) => return Err(self.failed(applied, e)),
                }
            }
        };

        Ok(Challenge {
            timeout: Duration::from_secs(self.review.timeout_for_stage(item.stage.number())),
            view,
            distractors,
        })
    }

    fn apply(&self, item: &Item, outcome: Outcome, applied: usize) -> Result<()> {
        self.store
            .update_after_response(item.id, outcome, None)
            .map(|_| ())
            .map_err(|e| self.failed(applied, e))
    }

    /// Mark every item from `from` onward with a penalty-free timeout.
    /// Returns how many updates were applied. `base` is the count of updates
    /// already applied this session, used for the failure payload.
    fn mark_timeout(
        &self,
        items: &[Item],
        from: usize,
        base: usize,
        stats: &mut SessionStats,
    ) -> Result<usize> {
        let mut applied = 0;
        for item in &items[from..] {
            self.store
                .update_after_response(item.id, Outcome::timeout(), None)
                .map_err(|e| self.failed(base + applied, e))?;
            applied += 1;
            stats.timeouts += 1;
        }
        Ok(applied)
    }

    fn failed(&self, applied: usize, source: StoreError) -> SessionError {
        error!(applied, error = %source, "session aborted on store failure");
        SessionError::SessionFailed {
            applied,
            source,
            fallback_delay: self.scheduler.retry_delay(),
        }
    }

    fn next_wake(&self) -> Duration {
        match self.scheduler.next_wake_delay() {
            Ok(delay) => delay,
            Err(e) => {
                error!(error = %e, "next-wake computation failed; using retry delay");
                self.scheduler.retry_delay()
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
        debug!(?state, "orchestrator state");
    }
}

fn tally(stats: &mut SessionStats, outcome: Outcome) {
    match outcome {
        Outcome::Correct => stats.correct += 1,
        Outcome::Wrong => stats.wrong += 1,
        Outcome::Timeout { .. } => stats.timeouts += 1,
        Outcome::Escape { .. } => stats.escapes += 1,
    }
}
