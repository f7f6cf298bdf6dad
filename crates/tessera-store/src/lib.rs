//! The `DatabaseManager` consumed interface (§6) and a reference in-memory
//! implementation.
//!
//! The engine itself never assumes anything about how graphs, executions and
//! the credit ledger are actually stored; this crate is the seam. Production
//! deployments implement [`DatabaseManager`] against a real database;
//! [`InMemoryDatabaseManager`] exists for tests and single-process use.

mod error;
mod in_memory;
mod manager;
mod types;

pub use error::StoreError;
pub use in_memory::InMemoryDatabaseManager;
pub use manager::DatabaseManager;
pub use types::{CreatedGraphExecution, ExecutionUpdate, GraphMetadata};

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use serde_json::json;
  use tessera_credit::UsageTransactionMetadata;
  use tessera_graph::{ExecutionStatus, Graph, Link, Node};

  use super::*;

  fn single_node_graph() -> Graph {
    let node = Node::new("node-a", "block-a");
    let mut nodes = HashMap::new();
    nodes.insert(node.node_id.clone(), node);
    Graph {
      graph_id: "graph-1".to_string(),
      version: 1,
      nodes,
      links: Vec::new(),
      starting_nodes: vec!["node-a".to_string()],
    }
  }

  #[tokio::test]
  async fn create_graph_execution_seeds_node_executions() {
    let store = InMemoryDatabaseManager::new();
    let graph = single_node_graph();
    store.register_graph(graph.clone()).await;

    let mut input = tessera_graph::BlockInput::new();
    input.insert("value".to_string(), json!(7));
    let created = store
      .create_graph_execution(&graph, "user-1", None, vec![("node-a".to_string(), input)])
      .await
      .unwrap();

    assert_eq!(created.node_executions.len(), 1);
    assert_eq!(created.node_executions[0].status, ExecutionStatus::Queued);
    assert_eq!(created.graph_exec.status, ExecutionStatus::Queued);
  }

  #[tokio::test]
  async fn status_transitions_reject_backward_moves() {
    let store = InMemoryDatabaseManager::new();
    let graph = single_node_graph();
    store.register_graph(graph.clone()).await;
    let created = store
      .create_graph_execution(&graph, "user-1", None, vec![("node-a".to_string(), Default::default())])
      .await
      .unwrap();
    let node_exec_id = created.node_executions[0].node_exec_id.clone();

    store
      .update_node_execution_status(&node_exec_id, ExecutionStatus::Running, None)
      .await
      .unwrap();
    store
      .update_node_execution_status(&node_exec_id, ExecutionStatus::Completed, None)
      .await
      .unwrap();
    // Backward move is silently rejected, not an error — callers observe it
    // via the unchanged persisted status.
    store
      .update_node_execution_status(&node_exec_id, ExecutionStatus::Running, None)
      .await
      .unwrap();
    let result = store.get_node_execution_results(&node_exec_id).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Completed);
  }

  #[tokio::test]
  async fn upsert_execution_input_creates_then_fills_one_node_execution() {
    let store = InMemoryDatabaseManager::new();
    let mut graph = single_node_graph();
    graph.nodes.get_mut("node-a").unwrap().input_links = vec![Link {
      source_id: "node-0".to_string(),
      source_name: "out".to_string(),
      sink_id: "node-a".to_string(),
      sink_name: "x".to_string(),
      is_static: false,
    }];
    store.register_graph(graph.clone()).await;

    let first = store
      .upsert_execution_input("exec-1", "node-a", "x", json!(1))
      .await
      .unwrap();
    assert_eq!(first.input_data["x"], json!(1));

    // A second upsert on the same pin (now occupied) opens a fresh
    // NodeExecution rather than overwriting the first.
    let second = store
      .upsert_execution_input("exec-1", "node-a", "x", json!(2))
      .await
      .unwrap();
    assert_ne!(first.node_exec_id, second.node_exec_id);
  }

  #[tokio::test]
  async fn spend_credits_rejects_amount_over_balance() {
    let store = InMemoryDatabaseManager::new();
    store.set_balance("user-1", 10).await;
    let metadata = UsageTransactionMetadata::for_node("graph-1", "exec-1");
    let err = store.spend_credits("user-1", 20, metadata).await.unwrap_err();
    assert!(matches!(err, StoreError::InsufficientBalance(_)));
    assert_eq!(store.balance("user-1").await, 10);
  }
}
