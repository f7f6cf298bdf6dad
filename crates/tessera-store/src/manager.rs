use async_trait::async_trait;
use serde_json::Value;
use tessera_credit::UsageTransactionMetadata;
use tessera_graph::{
  BlockInput, ExecutionStatus, Graph, GraphExecutionStats, Node, NodeExecution, NodeExecutionStats,
};

use crate::error::StoreError;
use crate::types::{CreatedGraphExecution, ExecutionUpdate, GraphMetadata};

/// The persistence seam consumed by the resolver, executor and scheduler
/// (§6). Out of scope: how any of this is actually stored. An implementation
/// must honor the monotonic status invariant (§3) and append-only output
/// ordering; see [`crate::InMemoryDatabaseManager`] for a reference
/// implementation used in tests and single-process deployments.
#[async_trait]
pub trait DatabaseManager: Send + Sync {
  async fn get_graph(&self, graph_id: &str, version: Option<u32>) -> Result<Graph, StoreError>;

  async fn get_node(&self, node_id: &str) -> Result<Node, StoreError>;

  /// The most recently completed execution of `node_id` within `graph_exec_id`,
  /// used as the static cache (§4.1 step 3).
  async fn get_latest_node_execution(
    &self,
    node_id: &str,
    graph_exec_id: &str,
  ) -> Result<Option<NodeExecution>, StoreError>;

  /// All `INCOMPLETE` executions of `node_id` within `graph_exec_id`, ordered
  /// oldest-first (§4.1 step 6).
  async fn get_incomplete_node_executions(
    &self,
    node_id: &str,
    graph_exec_id: &str,
  ) -> Result<Vec<NodeExecution>, StoreError>;

  async fn get_node_execution_results(&self, node_exec_id: &str) -> Result<NodeExecution, StoreError>;

  /// Every `NodeExecution` belonging to `graph_exec_id`, optionally filtered
  /// to the given statuses. Backs `cancel_execution`'s non-terminal sweep
  /// (§4.5 step 3) and the scheduler's end-of-run output aggregation (§4.3).
  async fn list_node_executions(
    &self,
    graph_exec_id: &str,
    statuses: Option<&[ExecutionStatus]>,
  ) -> Result<Vec<NodeExecution>, StoreError>;

  async fn get_graph_metadata(&self, graph_id: &str) -> Result<GraphMetadata, StoreError>;

  /// §4.5 step 5: persist a new GraphExecution plus its seed NodeExecutions
  /// (one per starting node with validated input).
  async fn create_graph_execution(
    &self,
    graph: &Graph,
    user_id: &str,
    preset_id: Option<String>,
    seed_inputs: Vec<(String, BlockInput)>,
  ) -> Result<CreatedGraphExecution, StoreError>;

  async fn update_graph_execution_start_time(&self, graph_exec_id: &str) -> Result<(), StoreError>;

  async fn update_graph_execution_stats(
    &self,
    graph_exec_id: &str,
    stats: GraphExecutionStats,
    status: Option<ExecutionStatus>,
  ) -> Result<(), StoreError>;

  /// Sets the `GraphExecution` status without touching accumulated stats.
  /// Used by `cancel_execution` (§4.5), which observes a run from outside
  /// its Graph Scheduler and has no stats of its own to report.
  async fn update_graph_execution_status(
    &self,
    graph_exec_id: &str,
    status: ExecutionStatus,
  ) -> Result<(), StoreError>;

  async fn update_node_execution_status(
    &self,
    node_exec_id: &str,
    status: ExecutionStatus,
    input_data: Option<BlockInput>,
  ) -> Result<(), StoreError>;

  /// §4.5 `cancel_execution` step 3: batch-transition every execution still
  /// in a non-terminal state.
  async fn update_node_execution_status_batch(
    &self,
    node_exec_ids: &[String],
    status: ExecutionStatus,
  ) -> Result<(), StoreError>;

  async fn update_node_execution_stats(
    &self,
    node_exec_id: &str,
    stats: NodeExecutionStats,
  ) -> Result<(), StoreError>;

  /// §4.1 step 2: the atomic input upsert. Attaches `value` on pin
  /// `sink_name` to the earliest `INCOMPLETE` execution of `sink_id` missing
  /// that pin, or creates one. Callers are expected to hold the
  /// `upsert_input-{sink_id}-{graph_exec_id}` distributed lock around this
  /// call (§5).
  async fn upsert_execution_input(
    &self,
    graph_exec_id: &str,
    sink_id: &str,
    sink_name: &str,
    value: Value,
  ) -> Result<NodeExecution, StoreError>;

  /// §4.2 step 5: append `value` to `pin`'s output history for `node_exec_id`.
  async fn upsert_execution_output(
    &self,
    node_exec_id: &str,
    pin: &str,
    value: Value,
  ) -> Result<(), StoreError>;

  async fn send_execution_update(&self, update: ExecutionUpdate) -> Result<(), StoreError>;

  /// Debits `amount` credits from `user_id`, raising
  /// [`tessera_credit::InsufficientBalanceError`] (wrapped in
  /// [`StoreError::InsufficientBalance`]) if the balance would go negative
  /// (§4.4). Returns the balance after the debit.
  async fn spend_credits(
    &self,
    user_id: &str,
    amount: u64,
    metadata: UsageTransactionMetadata,
  ) -> Result<u64, StoreError>;
}
