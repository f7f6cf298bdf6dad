//! The Execution Manager (§4.5): the entry point that turns an
//! `add_execution` request into a running graph, and `cancel_execution` into
//! a terminated one. Owns the intake queue and the graph-worker pool that
//! feeds [`tessera_scheduler::GraphScheduler`].

mod config;
mod error;
mod manager;
mod request;

pub use config::ExecutionManagerConfig;
pub use error::ManagerError;
pub use manager::ExecutionManager;
pub use request::AddExecutionRequest;

#[cfg(test)]
mod tests {
  use std::collections::HashMap;
  use std::sync::Arc;
  use std::time::Duration;

  use serde_json::{json, Value};
  use tessera_credit::NoopCostModel;
  use tessera_executor::StaticCredentialStore;
  use tessera_graph::{
    Block, BlockCatalog, BlockOutputStream, BlockSchema, BlockType, ExecutionContext, FieldSpec, Graph, Node,
    ValueType,
  };
  use tessera_lock::InProcessLock;
  use tessera_notify::LoggingNotificationSink;
  use tessera_store::InMemoryDatabaseManager;

  use super::*;

  struct InputBlock {
    schema: BlockSchema,
  }

  impl Block for InputBlock {
    fn id(&self) -> &str {
      "input-block"
    }
    fn name(&self) -> &str {
      "Input"
    }
    fn block_type(&self) -> BlockType {
      BlockType::Input
    }
    fn input_schema(&self) -> &BlockSchema {
      &self.schema
    }
    fn execute(&self, input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
      let value = input.get("value").cloned().unwrap_or(Value::Null);
      Box::pin(futures::stream::once(async move { Ok(("result".to_string(), value)) }))
    }
  }

  struct MapCatalog(HashMap<String, Arc<dyn Block>>);

  impl BlockCatalog for MapCatalog {
    fn get(&self, block_id: &str) -> Option<Arc<dyn Block>> {
      self.0.get(block_id).cloned()
    }
  }

  fn single_input_graph() -> (Graph, Arc<MapCatalog>) {
    let mut node = Node::new("entry", "input-block");
    node.input_default.insert("name".to_string(), json!("greeting"));
    let mut nodes = HashMap::new();
    nodes.insert("entry".to_string(), node);
    let graph = Graph {
      graph_id: "graph-1".to_string(),
      version: 1,
      nodes,
      links: Vec::new(),
      starting_nodes: vec!["entry".to_string()],
    };

    let mut fields = HashMap::new();
    fields.insert("value".to_string(), FieldSpec::optional(ValueType::Any));
    let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();
    blocks.insert("input-block".to_string(), Arc::new(InputBlock { schema: BlockSchema { fields, credentials: HashMap::new() } }));
    (graph, Arc::new(MapCatalog(blocks)))
  }

  fn manager_for(store: Arc<InMemoryDatabaseManager>, catalog: Arc<MapCatalog>) -> ExecutionManager {
    let lock = Arc::new(InProcessLock::new());
    let credentials = Arc::new(StaticCredentialStore::new(HashMap::new()));
    ExecutionManager::new(
      store,
      lock,
      catalog,
      credentials,
      Arc::new(NoopCostModel),
      Arc::new(LoggingNotificationSink),
      ExecutionManagerConfig {
        num_graph_workers: 2,
        num_node_workers: 2,
        frontend_base_url: None,
        platform_base_url: "https://example.test".to_string(),
      },
    )
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn add_execution_admits_and_runs_a_graph() {
    let (graph, catalog) = single_input_graph();
    let store = Arc::new(InMemoryDatabaseManager::new());
    store.register_graph(graph).await;
    store.set_balance("user-1", 100).await;

    let manager = manager_for(store.clone(), catalog);
    let mut data = HashMap::new();
    data.insert("greeting".to_string(), json!("hello"));
    let entry = manager
      .add_execution(AddExecutionRequest {
        graph_id: "graph-1".to_string(),
        graph_version: None,
        user_id: "user-1".to_string(),
        preset_id: None,
        data,
      })
      .await
      .unwrap();

    assert_eq!(entry.start_node_execs.len(), 1);
    assert_eq!(entry.start_node_execs[0].data["value"], json!("hello"));

    // Give the graph-worker pool a moment to actually run it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let execs = store.list_node_executions(&entry.graph_exec_id, None).await.unwrap();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].status, tessera_graph::ExecutionStatus::Completed);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn add_execution_rejects_empty_graph_without_starting_nodes() {
    let store = Arc::new(InMemoryDatabaseManager::new());
    let graph = Graph {
      graph_id: "graph-empty".to_string(),
      version: 1,
      nodes: HashMap::new(),
      links: Vec::new(),
      starting_nodes: Vec::new(),
    };
    store.register_graph(graph).await;
    let catalog = Arc::new(MapCatalog(HashMap::new()));

    let manager = manager_for(store, catalog);
    let err = manager
      .add_execution(AddExecutionRequest {
        graph_id: "graph-empty".to_string(),
        graph_version: None,
        user_id: "user-1".to_string(),
        preset_id: None,
        data: HashMap::new(),
      })
      .await
      .unwrap_err();

    assert!(matches!(err, ManagerError::Graph(_)));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn cancel_execution_is_idempotent_on_an_unknown_run() {
    let store = Arc::new(InMemoryDatabaseManager::new());
    let (graph, catalog) = single_input_graph();
    store.register_graph(graph.clone()).await;
    let created = store
      .create_graph_execution(&graph, "user-1", None, vec![("entry".to_string(), Default::default())])
      .await
      .unwrap();

    let manager = manager_for(store.clone(), catalog);
    manager.cancel_execution(&created.graph_exec.graph_exec_id).await.unwrap();
    manager.cancel_execution(&created.graph_exec.graph_exec_id).await.unwrap();

    let exec = store.list_node_executions(&created.graph_exec.graph_exec_id, None).await.unwrap();
    assert_eq!(exec[0].status, tessera_graph::ExecutionStatus::Terminated);
  }
}
