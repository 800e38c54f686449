//! Running several commands concurrently as one unit.

use futures::future::join_all;
use thiserror::Error;

use crate::exec::{CommandRunner, CommandSpec, ExecutionOutcome};

/// One member of a group that did not succeed.
#[derive(Debug, Clone)]
pub struct MemberFailure {
    /// Position in the submitted list.
    pub index: usize,
    /// What went wrong.
    pub reason: FailureReason,
}

/// Why a group member failed.
#[derive(Debug, Clone)]
pub enum FailureReason {
    /// The process ran and exited non-zero, was signalled, or timed out.
    Exited(ExecutionOutcome),
    /// The process never started.
    Spawn(String),
}

/// Aggregate failure: every failed member, in submission order.
#[derive(Debug, Clone, Error)]
#[error("{} of {total} commands failed", .failures.len())]
pub struct GroupFailure {
    /// Members that failed.
    pub failures: Vec<MemberFailure>,
    /// Outcomes for every member that ran, by index; `None` for spawn failures.
    pub outcomes: Vec<Option<ExecutionOutcome>>,
    /// Group size.
    pub total: usize,
}

/// Run all specs concurrently and wait for every one of them.
///
/// Returns the outcomes in submission order when all succeed.
pub async fn run_group(
    runner: &dyn CommandRunner,
    specs: &[CommandSpec],
) -> std::result::Result<Vec<ExecutionOutcome>, GroupFailure> {
    let results = join_all(specs.iter().map(|spec| runner.run(spec))).await;

    let total = results.len();
    let mut failures = Vec::new();
    let mut outcomes = Vec::with_capacity(total);

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(outcome) => {
                if !outcome.succeeded() {
                    failures.push(MemberFailure {
                        index,
                        reason: FailureReason::Exited(outcome.clone()),
                    });
                }
                outcomes.push(Some(outcome));
            }
            Err(e) => {
                failures.push(MemberFailure {
                    index,
                    reason: FailureReason::Spawn(e.to_string()),
                });
                outcomes.push(None);
            }
        }
    }

    if failures.is_empty() {
        Ok(outcomes.into_iter().flatten().collect())
    } else {
        Err(GroupFailure {
            failures,
            outcomes,
            total,
        })
    }
}
