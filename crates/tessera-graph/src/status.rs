use serde::{Deserialize, Serialize};

/// Status shared by both `GraphExecution` and `NodeExecution` (see spec §3).
///
/// Transitions are monotonic: `INCOMPLETE` only precedes `QUEUED`, and once a
/// node execution reaches a terminal state (`COMPLETED`, `FAILED`,
/// `TERMINATED`) it never leaves it. Re-applying the same status is allowed
/// so that cancellation and other idempotent updates don't need to special
/// case "already there".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
  /// Awaiting further inputs; not yet on the ready-queue.
  Incomplete,
  /// On (or about to be placed on) the ready-queue.
  Queued,
  /// Currently executing.
  Running,
  /// Finished successfully.
  Completed,
  /// Finished with a block or scheduler error.
  Failed,
  /// Cancelled.
  Terminated,
}

impl ExecutionStatus {
  /// Whether this status is terminal (no further transitions are possible).
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Terminated
    )
  }

  /// Whether moving from `self` to `next` is a legal transition per §3.
  pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
    use ExecutionStatus::*;

    if self == next {
      return true;
    }
    match (self, next) {
      (Incomplete, Queued | Terminated) => true,
      (Queued, Running | Failed | Terminated) => true,
      (Running, Completed | Failed | Terminated) => true,
      _ => false,
    }
  }
}
