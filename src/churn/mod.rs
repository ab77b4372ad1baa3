//! Randomized workload driver ("churn")
//!
//! Each pass draws one selector uniformly from 0..5:
//!
//! | Selector | Action                                             |
//! |----------|----------------------------------------------------|
//! | 0        | create volume, size in 1..=10, replica 3           |
//! | 1        | delete a random volume                             |
//! | 2        | create block volume, size in 4..=20                |
//! | 3        | delete a random block volume                       |
//! | 4        | burst: draw a count in 10..=50, then one of 0..=3, |
//! |          | run that action count times                        |
//!
//! Deletes skip (logged, no error) when nothing is eligible: no candidates,
//! or a volume that still hosts block volumes. Runner errors are logged and
//! recorded; the run goes on. A failed read transaction ends the run.
//!
//! Every draw comes from one seedable generator, so a seed and a pass count
//! replay the same actions, sizes and victims against the same start state.

mod errors;
mod report;

pub use errors::{ChurnError, ChurnResult};
pub use report::{Action, ActionRecord, ChurnReport, Outcome, PassRecord};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::entries::Durability;
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::orchestrator::{Operation, Orchestrator, StoreError, VolumeRequest};

/// One past the last action number; drawing it starts a burst
const BURST_SELECTOR: u32 = Action::ALL.len() as u32;

/// The churn driver; owns the only random source
pub struct Churn<R: Rng> {
    rng: R,
}

impl Churn<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Churn<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Runs `passes` passes against `orch`, strictly one action at a time.
    pub fn run<O: Orchestrator>(&mut self, orch: &mut O, passes: u32) -> ChurnResult<ChurnReport> {
        let total = passes.to_string();
        let scope = ObservationScope::with_fields("CHURN", &[("passes", &total)]);

        let mut report = ChurnReport::default();
        for pass in 0..passes {
            match self.pass(orch, pass) {
                Ok(record) => report.passes.push(record),
                Err(e) => {
                    scope.fail(&e.to_string());
                    return Err(e);
                }
            }
        }

        let (submitted, failed, skipped) = (
            report.submitted().to_string(),
            report.failed().to_string(),
            report.skipped().to_string(),
        );
        scope.complete_with_fields(&[
            ("failed", &failed),
            ("skipped", &skipped),
            ("submitted", &submitted),
        ]);
        Ok(report)
    }

    fn pass<O: Orchestrator>(&mut self, orch: &mut O, pass: u32) -> ChurnResult<PassRecord> {
        let selector = self.rng.gen_range(0..=BURST_SELECTOR);
        let (index, count, burst_count) = if selector == BURST_SELECTOR {
            let count = self.rng.gen_range(10..=50u32);
            (self.rng.gen_range(0..BURST_SELECTOR), count, Some(count))
        } else {
            (selector, 1, None)
        };
        let action = Action::ALL[index as usize];

        let (at, sel, n) = (pass.to_string(), selector.to_string(), count.to_string());
        log_event_with_fields(
            Event::ChurnPass,
            &[
                ("action", action.as_str()),
                ("count", &n),
                ("pass", &at),
                ("selector", &sel),
            ],
        );

        let mut actions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let record = self
                .act(orch, action)
                .map_err(|source| ChurnError::Store { pass, source })?;
            actions.push(record);
        }

        Ok(PassRecord {
            selector,
            burst_count,
            actions,
        })
    }

    fn act<O: Orchestrator>(
        &mut self,
        orch: &mut O,
        action: Action,
    ) -> Result<ActionRecord, StoreError> {
        let rng = &mut self.rng;
        let record = match action {
            Action::CreateVolume => {
                let size = rng.gen_range(1..=10u64);
                let op = Operation::CreateVolume(VolumeRequest {
                    size,
                    durability: Durability::replicate(3),
                });
                ActionRecord {
                    action,
                    size: Some(size),
                    victim_index: None,
                    outcome: submit(orch, op),
                }
            }
            Action::CreateBlockVolume => {
                let size = rng.gen_range(4..=20u64);
                ActionRecord {
                    action,
                    size: Some(size),
                    victim_index: None,
                    outcome: submit(orch, Operation::CreateBlockVolume { size }),
                }
            }
            Action::DeleteVolume => {
                let picked = orch.view(|tx| {
                    let ids = tx.volume_list()?;
                    if ids.is_empty() {
                        return Ok(None);
                    }
                    let index = rng.gen_range(0..ids.len());
                    Ok(Some((index, tx.volume(&ids[index])?)))
                })?;
                match picked {
                    None => skipped(action, None, "no volumes"),
                    Some((index, volume)) if volume.hosts_block_volumes() => {
                        skipped(action, Some(index), "volume hosts block volumes")
                    }
                    Some((index, volume)) => ActionRecord {
                        action,
                        size: None,
                        victim_index: Some(index),
                        outcome: submit(orch, Operation::DeleteVolume(volume)),
                    },
                }
            }
            Action::DeleteBlockVolume => {
                let picked = orch.view(|tx| {
                    let ids = tx.block_volume_list()?;
                    if ids.is_empty() {
                        return Ok(None);
                    }
                    let index = rng.gen_range(0..ids.len());
                    Ok(Some((index, tx.block_volume(&ids[index])?)))
                })?;
                match picked {
                    None => skipped(action, None, "no block volumes"),
                    Some((index, block_volume)) => ActionRecord {
                        action,
                        size: None,
                        victim_index: Some(index),
                        outcome: submit(orch, Operation::DeleteBlockVolume(block_volume)),
                    },
                }
            }
        };
        Ok(record)
    }
}

fn submit<O: Orchestrator>(orch: &mut O, op: Operation) -> Outcome {
    let name = op.name();
    match orch.run_operation(op) {
        Ok(()) => {
            log_event_with_fields(Event::ChurnAction, &[("operation", name)]);
            Outcome::Submitted
        }
        Err(e) => {
            let reason = e.to_string();
            log_event_with_fields(
                Event::ChurnOperationFailed,
                &[("code", e.code()), ("operation", name), ("reason", &reason)],
            );
            Outcome::Failed(reason)
        }
    }
}

fn skipped(action: Action, victim_index: Option<usize>, reason: &str) -> ActionRecord {
    log_event_with_fields(
        Event::ChurnSkipped,
        &[("action", action.as_str()), ("reason", reason)],
    );
    ActionRecord {
        action,
        size: None,
        victim_index,
        outcome: Outcome::Skipped(reason.to_string()),
    }
}
