use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tessera_credit::{InsufficientBalanceError, UsageTransactionMetadata};
use tessera_graph::{
  BlockInput, ExecutionStatus, Graph, GraphExecution, GraphExecutionStats, Node, NodeExecution,
  NodeExecutionStats,
};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::error::StoreError;
use crate::manager::DatabaseManager;
use crate::types::{CreatedGraphExecution, ExecutionUpdate, GraphMetadata};

#[derive(Default)]
struct State {
  graphs: HashMap<(String, u32), Graph>,
  latest_version: HashMap<String, u32>,
  nodes: HashMap<String, Node>,
  node_graph: HashMap<String, String>,
  graph_executions: HashMap<String, GraphExecution>,
  node_executions: HashMap<String, NodeExecution>,
  balances: HashMap<String, u64>,
}

/// A single-process `DatabaseManager` backed by in-memory maps, guarded by
/// one `RwLock` and broadcasting updates over a `tokio::sync::broadcast`
/// channel. Suitable for tests and single-node deployments; a production
/// deployment swaps this for a real store without touching the engine.
pub struct InMemoryDatabaseManager {
  state: RwLock<State>,
  updates: broadcast::Sender<ExecutionUpdate>,
  sequence: AtomicU64,
}

impl Default for InMemoryDatabaseManager {
  fn default() -> Self {
    Self::new()
  }
}

impl InMemoryDatabaseManager {
  pub fn new() -> Self {
    let (updates, _) = broadcast::channel(1024);
    Self {
      state: RwLock::new(State::default()),
      updates,
      sequence: AtomicU64::new(0),
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ExecutionUpdate> {
    self.updates.subscribe()
  }

  fn next_sequence(&self) -> u64 {
    self.sequence.fetch_add(1, Ordering::SeqCst)
  }

  /// Registers a graph definition so it can be resolved by `get_graph` /
  /// `get_node`. Graph authoring is out of scope for the engine (§1); this
  /// is the seeding hook tests and embedders use in its place.
  pub async fn register_graph(&self, graph: Graph) {
    let mut state = self.state.write().await;
    let graph_id = graph.graph_id.clone();
    let version = graph.version;
    for node in graph.nodes.values() {
      state.nodes.insert(node.node_id.clone(), node.clone());
      state.node_graph.insert(node.node_id.clone(), graph_id.clone());
    }
    let latest = state.latest_version.entry(graph_id.clone()).or_insert(version);
    if version >= *latest {
      *latest = version;
    }
    state.graphs.insert((graph_id, version), graph);
  }

  pub async fn set_balance(&self, user_id: &str, amount: u64) {
    self.state.write().await.balances.insert(user_id.to_string(), amount);
  }

  pub async fn balance(&self, user_id: &str) -> u64 {
    self.state.read().await.balances.get(user_id).copied().unwrap_or(0)
  }

  /// Test/embedder convenience accessor; the trait itself has no "get one
  /// GraphExecution by id" method since nothing in the engine's own flow
  /// needs it (status is observed via `send_execution_update` broadcasts).
  pub async fn graph_execution(&self, graph_exec_id: &str) -> Option<GraphExecution> {
    self.state.read().await.graph_executions.get(graph_exec_id).cloned()
  }
}

#[async_trait]
impl DatabaseManager for InMemoryDatabaseManager {
  async fn get_graph(&self, graph_id: &str, version: Option<u32>) -> Result<Graph, StoreError> {
    let state = self.state.read().await;
    let version = match version {
      Some(v) => v,
      None => *state
        .latest_version
        .get(graph_id)
        .ok_or_else(|| StoreError::GraphNotFound(graph_id.to_string()))?,
    };
    state
      .graphs
      .get(&(graph_id.to_string(), version))
      .cloned()
      .ok_or_else(|| StoreError::GraphNotFound(graph_id.to_string()))
  }

  async fn get_node(&self, node_id: &str) -> Result<Node, StoreError> {
    self
      .state
      .read()
      .await
      .nodes
      .get(node_id)
      .cloned()
      .ok_or_else(|| StoreError::NodeNotFound(node_id.to_string()))
  }

  async fn get_latest_node_execution(
    &self,
    node_id: &str,
    graph_exec_id: &str,
  ) -> Result<Option<NodeExecution>, StoreError> {
    let state = self.state.read().await;
    Ok(
      state
        .node_executions
        .values()
        .filter(|ne| {
          ne.node_id == node_id
            && ne.graph_exec_id == graph_exec_id
            && ne.status == ExecutionStatus::Completed
        })
        .max_by_key(|ne| ne.created_at)
        .cloned(),
    )
  }

  async fn get_incomplete_node_executions(
    &self,
    node_id: &str,
    graph_exec_id: &str,
  ) -> Result<Vec<NodeExecution>, StoreError> {
    let state = self.state.read().await;
    let mut found: Vec<NodeExecution> = state
      .node_executions
      .values()
      .filter(|ne| {
        ne.node_id == node_id
          && ne.graph_exec_id == graph_exec_id
          && ne.status == ExecutionStatus::Incomplete
      })
      .cloned()
      .collect();
    found.sort_by_key(|ne| ne.created_at);
    Ok(found)
  }

  async fn get_node_execution_results(&self, node_exec_id: &str) -> Result<NodeExecution, StoreError> {
    self
      .state
      .read()
      .await
      .node_executions
      .get(node_exec_id)
      .cloned()
      .ok_or_else(|| StoreError::NodeExecutionNotFound(node_exec_id.to_string()))
  }

  async fn get_graph_metadata(&self, graph_id: &str) -> Result<GraphMetadata, StoreError> {
    let graph = self.get_graph(graph_id, None).await?;
    Ok(GraphMetadata {
      graph_id: graph.graph_id,
      name: graph_id.to_string(),
    })
  }

  async fn create_graph_execution(
    &self,
    graph: &Graph,
    user_id: &str,
    preset_id: Option<String>,
    seed_inputs: Vec<(String, BlockInput)>,
  ) -> Result<CreatedGraphExecution, StoreError> {
    let graph_exec_id = Uuid::new_v4().to_string();
    let graph_exec = GraphExecution {
      graph_exec_id: graph_exec_id.clone(),
      graph_id: graph.graph_id.clone(),
      graph_version: graph.version,
      user_id: user_id.to_string(),
      preset_id,
      status: ExecutionStatus::Queued,
      stats: GraphExecutionStats::default(),
    };

    let mut node_executions = Vec::with_capacity(seed_inputs.len());
    {
      let mut state = self.state.write().await;
      state.graph_executions.insert(graph_exec_id.clone(), graph_exec.clone());
      for (node_id, input_data) in seed_inputs {
        let node = graph
          .get_node(&node_id)
          .ok_or_else(|| StoreError::NodeNotFound(node_id.clone()))?;
        let mut node_exec = NodeExecution::new(
          Uuid::new_v4().to_string(),
          graph_exec_id.clone(),
          node_id,
          node.block_id.clone(),
          self.next_sequence(),
        );
        node_exec.status = ExecutionStatus::Queued;
        node_exec.input_data = input_data;
        state.node_executions.insert(node_exec.node_exec_id.clone(), node_exec.clone());
        node_executions.push(node_exec);
      }
    }

    let _ = self.updates.send(ExecutionUpdate::Graph(graph_exec.clone()));
    Ok(CreatedGraphExecution {
      graph_exec,
      node_executions,
    })
  }

  async fn update_graph_execution_start_time(&self, graph_exec_id: &str) -> Result<(), StoreError> {
    let state = self.state.read().await;
    state
      .graph_executions
      .get(graph_exec_id)
      .map(|_| ())
      .ok_or_else(|| StoreError::GraphExecutionNotFound(graph_exec_id.to_string()))
  }

  async fn update_graph_execution_stats(
    &self,
    graph_exec_id: &str,
    stats: GraphExecutionStats,
    status: Option<ExecutionStatus>,
  ) -> Result<(), StoreError> {
    let updated = {
      let mut state = self.state.write().await;
      let exec = state
        .graph_executions
        .get_mut(graph_exec_id)
        .ok_or_else(|| StoreError::GraphExecutionNotFound(graph_exec_id.to_string()))?;
      exec.stats = stats;
      if let Some(status) = status {
        exec.status = status;
      }
      exec.clone()
    };
    let _ = self.updates.send(ExecutionUpdate::Graph(updated));
    Ok(())
  }

  async fn update_graph_execution_status(
    &self,
    graph_exec_id: &str,
    status: ExecutionStatus,
  ) -> Result<(), StoreError> {
    let updated = {
      let mut state = self.state.write().await;
      let exec = state
        .graph_executions
        .get_mut(graph_exec_id)
        .ok_or_else(|| StoreError::GraphExecutionNotFound(graph_exec_id.to_string()))?;
      exec.status = status;
      exec.clone()
    };
    let _ = self.updates.send(ExecutionUpdate::Graph(updated));
    Ok(())
  }

  async fn list_node_executions(
    &self,
    graph_exec_id: &str,
    statuses: Option<&[ExecutionStatus]>,
  ) -> Result<Vec<NodeExecution>, StoreError> {
    let state = self.state.read().await;
    let mut found: Vec<NodeExecution> = state
      .node_executions
      .values()
      .filter(|ne| {
        ne.graph_exec_id == graph_exec_id
          && statuses.is_none_or(|statuses| statuses.contains(&ne.status))
      })
      .cloned()
      .collect();
    found.sort_by_key(|ne| ne.created_at);
    Ok(found)
  }

  async fn update_node_execution_status(
    &self,
    node_exec_id: &str,
    status: ExecutionStatus,
    input_data: Option<BlockInput>,
  ) -> Result<(), StoreError> {
    let updated = {
      let mut state = self.state.write().await;
      let exec = state
        .node_executions
        .get_mut(node_exec_id)
        .ok_or_else(|| StoreError::NodeExecutionNotFound(node_exec_id.to_string()))?;
      if !exec.status.can_transition_to(status) {
        tracing::warn!(node_exec_id, from = ?exec.status, to = ?status, "rejected non-monotonic status transition");
        return Ok(());
      }
      exec.status = status;
      if let Some(input_data) = input_data {
        exec.input_data = input_data;
      }
      exec.clone()
    };
    let _ = self.updates.send(ExecutionUpdate::Node(updated));
    Ok(())
  }

  async fn update_node_execution_status_batch(
    &self,
    node_exec_ids: &[String],
    status: ExecutionStatus,
  ) -> Result<(), StoreError> {
    for node_exec_id in node_exec_ids {
      self.update_node_execution_status(node_exec_id, status, None).await?;
    }
    Ok(())
  }

  async fn update_node_execution_stats(
    &self,
    node_exec_id: &str,
    stats: NodeExecutionStats,
  ) -> Result<(), StoreError> {
    let mut state = self.state.write().await;
    let exec = state
      .node_executions
      .get_mut(node_exec_id)
      .ok_or_else(|| StoreError::NodeExecutionNotFound(node_exec_id.to_string()))?;
    exec.stats = stats;
    Ok(())
  }

  async fn upsert_execution_input(
    &self,
    graph_exec_id: &str,
    sink_id: &str,
    sink_name: &str,
    value: Value,
  ) -> Result<NodeExecution, StoreError> {
    let mut state = self.state.write().await;
    let candidate_id = state
      .node_executions
      .values()
      .filter(|ne| {
        ne.node_id == sink_id
          && ne.graph_exec_id == graph_exec_id
          && ne.status == ExecutionStatus::Incomplete
          && !ne.input_data.contains_key(sink_name)
      })
      .min_by_key(|ne| ne.created_at)
      .map(|ne| ne.node_exec_id.clone());

    if let Some(node_exec_id) = candidate_id {
      let exec = state.node_executions.get_mut(&node_exec_id).expect("just looked up");
      exec.input_data.insert(sink_name.to_string(), value);
      return Ok(exec.clone());
    }

    let node = state
      .nodes
      .get(sink_id)
      .cloned()
      .ok_or_else(|| StoreError::NodeNotFound(sink_id.to_string()))?;
    let mut node_exec = NodeExecution::new(
      Uuid::new_v4().to_string(),
      graph_exec_id.to_string(),
      sink_id.to_string(),
      node.block_id,
      self.next_sequence(),
    );
    node_exec.input_data.insert(sink_name.to_string(), value);
    state.node_executions.insert(node_exec.node_exec_id.clone(), node_exec.clone());
    Ok(node_exec)
  }

  async fn upsert_execution_output(
    &self,
    node_exec_id: &str,
    pin: &str,
    value: Value,
  ) -> Result<(), StoreError> {
    let mut state = self.state.write().await;
    let exec = state
      .node_executions
      .get_mut(node_exec_id)
      .ok_or_else(|| StoreError::NodeExecutionNotFound(node_exec_id.to_string()))?;
    exec.output_data.entry(pin.to_string()).or_default().push(value);
    Ok(())
  }

  async fn send_execution_update(&self, update: ExecutionUpdate) -> Result<(), StoreError> {
    let _ = self.updates.send(update);
    Ok(())
  }

  async fn spend_credits(
    &self,
    user_id: &str,
    amount: u64,
    _metadata: UsageTransactionMetadata,
  ) -> Result<u64, StoreError> {
    let mut state = self.state.write().await;
    let balance = state.balances.entry(user_id.to_string()).or_insert(0);
    if amount > *balance {
      return Err(StoreError::InsufficientBalance(InsufficientBalanceError::new(
        *balance, amount,
      )));
    }
    *balance -= amount;
    Ok(*balance)
  }
}
