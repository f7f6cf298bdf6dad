use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex};

use futures::FutureExt;
use tessera_executor::{NodeExecutor, RunOutcome};
use tessera_graph::{Graph, NodeExecutionEntry};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// What a node-worker task reports back to the scheduler when it finishes.
/// `outcome` is `None` only when the task panicked — a worker crash (§4.3
/// Failure semantics); the scheduler folds nothing into its stats for that
/// case and the per-node slot simply frees up.
pub struct Completion {
  pub node_id: String,
  pub outcome: Option<RunOutcome>,
}

/// A bounded pool of node-worker tasks (§4.3, §9 "a task-based runtime may
/// substitute lightweight tasks for node workers"). Concurrency is capped by
/// a semaphore rather than by the number of tasks spawned, so `submit` never
/// blocks the caller.
///
/// Cloning a `NodeWorkerPool` shares the same semaphore, completion channel
/// and abort-handle registry — the clone handed to the cancellation watcher
/// and the one driving the scheduler's own loop operate on the same pool.
#[derive(Clone)]
pub struct NodeWorkerPool {
  semaphore: Arc<Semaphore>,
  handles: Arc<StdMutex<Vec<AbortHandle>>>,
  tx: mpsc::UnboundedSender<Completion>,
}

impl NodeWorkerPool {
  /// Returns the pool handle plus the receiving half of its completion
  /// channel. Only one receiver should ever be created per pool.
  pub fn new(size: usize) -> (Self, mpsc::UnboundedReceiver<Completion>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pool = Self {
      semaphore: Arc::new(Semaphore::new(size.max(1))),
      handles: Arc::new(StdMutex::new(Vec::new())),
      tx,
    };
    (pool, rx)
  }

  /// Spawns `entry`'s execution. The task waits for a free permit before
  /// touching `executor`, so submitting more entries than `size` just queues
  /// them inside the runtime rather than growing unbounded concurrency.
  pub fn submit(
    &self,
    executor: Arc<NodeExecutor>,
    graph: Arc<Graph>,
    entry: NodeExecutionEntry,
    cancel: CancellationToken,
  ) {
    let semaphore = self.semaphore.clone();
    let tx = self.tx.clone();
    let node_id = entry.node_id.clone();
    let handle = tokio::spawn(async move {
      let _permit = semaphore.acquire_owned().await;
      let run = AssertUnwindSafe(async { executor.run(graph.as_ref(), entry, cancel).await }).catch_unwind();
      let outcome = match run.await {
        Ok(outcome) => Some(outcome),
        Err(_) => {
          tracing::error!(node_id, "node worker task panicked");
          None
        }
      };
      let _ = tx.send(Completion { node_id, outcome });
    });
    self.handles.lock().expect("abort handle registry poisoned").push(handle.abort_handle());
  }

  /// Forcefully kills every in-flight task in this pool (§4.3 Cancellation,
  /// §5). Tasks aborted this way never reach their completion send, so
  /// callers must not wait on the channel for them.
  pub fn terminate(&self) {
    for handle in self.handles.lock().expect("abort handle registry poisoned").drain(..) {
      handle.abort();
    }
  }
}
