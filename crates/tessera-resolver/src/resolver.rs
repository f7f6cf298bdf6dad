use std::sync::Arc;

use serde_json::Value;
use tessera_graph::{BlockCatalog, ExecutionStatus, Graph, Node, NodeExecution, NodeExecutionEntry};
use tessera_lock::DistributedLock;
use tessera_store::DatabaseManager;

use crate::error::ResolverError;
use crate::validate::{validate_input, ValidationError};

/// Turns a newly-produced `(pin, value)` from a completed node into zero or
/// more ready-to-run node executions on downstream nodes (§4.1).
pub struct Resolver {
  store: Arc<dyn DatabaseManager>,
  lock: Arc<dyn DistributedLock>,
  catalog: Arc<dyn BlockCatalog>,
}

impl Resolver {
  pub fn new(store: Arc<dyn DatabaseManager>, lock: Arc<dyn DistributedLock>, catalog: Arc<dyn BlockCatalog>) -> Self {
    Self { store, lock, catalog }
  }

  /// §4.1 steps 1-6, run once per outbound link of the producing node.
  pub async fn resolve_production(
    &self,
    graph: &Graph,
    graph_exec_id: &str,
    user_id: &str,
    producer_node_id: &str,
    pin: &str,
    value: Value,
  ) -> Result<Vec<NodeExecutionEntry>, ResolverError> {
    let mut ready = Vec::new();

    for link in graph.output_links_of(producer_node_id) {
      // step 1: project through the pin name. This engine's links carry no
      // further path expression, so projection is an exact pin match.
      if link.source_name != pin {
        continue;
      }
      let Some(sink_node) = graph.get_node(&link.sink_id) else {
        tracing::warn!(sink_id = %link.sink_id, "resolver: unknown sink node, dropping link");
        continue;
      };
      if self.catalog.get(&sink_node.block_id).is_none() {
        tracing::warn!(block_id = %sink_node.block_id, node_id = %sink_node.node_id, "resolver: block not found for sink, dropping link");
        continue;
      }

      // step 2: atomic input upsert under the per-sink lock.
      let lock_key = format!("upsert_input-{}-{}", link.sink_id, graph_exec_id);
      let _guard = self.lock.acquire_default(&lock_key).await?;

      let mut node_exec = self
        .store
        .upsert_execution_input(graph_exec_id, &link.sink_id, &link.sink_name, value.clone())
        .await?;

      // step 3: fill in static defaults from the sink's own static cache.
      self.merge_static_cache(graph_exec_id, sink_node, &mut node_exec).await?;

      if let Some(entry) = self
        .validate_and_enqueue(graph, graph_exec_id, user_id, sink_node, node_exec)
        .await?
      {
        ready.push(entry);
      }

      // step 6: a static link additionally fans out to every other
      // INCOMPLETE execution of the sink still missing this pin.
      if link.is_static {
        ready.extend(
          self
            .propagate_static(graph, graph_exec_id, user_id, sink_node, &link.sink_name, &value)
            .await?,
        );
      }
    }

    Ok(ready)
  }

  async fn merge_static_cache(
    &self,
    graph_exec_id: &str,
    node: &Node,
    node_exec: &mut NodeExecution,
  ) -> Result<(), ResolverError> {
    let static_pins: Vec<&str> = node
      .input_links
      .iter()
      .filter(|l| l.is_static && !node_exec.input_data.contains_key(&l.sink_name))
      .map(|l| l.sink_name.as_str())
      .collect();
    if static_pins.is_empty() {
      return Ok(());
    }
    let Some(latest) = self.store.get_latest_node_execution(&node.node_id, graph_exec_id).await? else {
      return Ok(());
    };
    for pin in static_pins {
      if let Some(value) = latest.input_data.get(pin) {
        node_exec.input_data.insert(pin.to_string(), value.clone());
      }
    }
    Ok(())
  }

  async fn propagate_static(
    &self,
    graph: &Graph,
    graph_exec_id: &str,
    user_id: &str,
    node: &Node,
    sink_name: &str,
    value: &Value,
  ) -> Result<Vec<NodeExecutionEntry>, ResolverError> {
    let mut ready = Vec::new();
    for mut node_exec in self.store.get_incomplete_node_executions(&node.node_id, graph_exec_id).await? {
      if node_exec.input_data.contains_key(sink_name) {
        continue;
      }
      node_exec.input_data.insert(sink_name.to_string(), value.clone());
      if let Some(entry) = self
        .validate_and_enqueue(graph, graph_exec_id, user_id, node, node_exec)
        .await?
      {
        ready.push(entry);
      }
    }
    Ok(ready)
  }

  /// steps 4-5: validate the accumulated input and either enqueue it
  /// (`QUEUED`, with the resolved input persisted) or leave it `INCOMPLETE`.
  async fn validate_and_enqueue(
    &self,
    graph: &Graph,
    graph_exec_id: &str,
    user_id: &str,
    node: &Node,
    node_exec: NodeExecution,
  ) -> Result<Option<NodeExecutionEntry>, ResolverError> {
    match validate_input(node, node_exec.input_data.clone(), self.catalog.as_ref(), true) {
      Ok((validated, _block_name)) => {
        self
          .store
          .update_node_execution_status(&node_exec.node_exec_id, ExecutionStatus::Queued, Some(validated.clone()))
          .await?;
        Ok(Some(NodeExecutionEntry {
          user_id: user_id.to_string(),
          graph_exec_id: graph_exec_id.to_string(),
          graph_id: graph.graph_id.clone(),
          node_exec_id: node_exec.node_exec_id,
          node_id: node.node_id.clone(),
          block_id: node.block_id.clone(),
          data: validated,
        }))
      }
      Err(ValidationError::MissingLinks(_)) | Err(ValidationError::MissingInput(_)) => {
        self
          .store
          .update_node_execution_status(
            &node_exec.node_exec_id,
            ExecutionStatus::Incomplete,
            Some(node_exec.input_data),
          )
          .await?;
        Ok(None)
      }
      Err(ValidationError::BlockNotFound { node_id, block_id }) => {
        tracing::warn!(node_id, block_id, "resolver: block not found, dropping");
        Ok(None)
      }
      Err(ValidationError::Mismatch(message)) => {
        tracing::warn!(node_exec_id = %node_exec.node_exec_id, message, "resolver: input mismatch, leaving incomplete");
        Ok(None)
      }
    }
  }
}
