//! End-to-end scenarios from the engine spec's testable-properties section,
//! driven through the full stack (manager → scheduler → executor →
//! resolver → store) the way a deployment actually wires these crates
//! together.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tessera_credit::{CostModel, FixedBlockCost, NoopCostModel};
use tessera_executor::StaticCredentialStore;
use tessera_graph::{
  Block, BlockCatalog, BlockError, BlockOutputStream, BlockSchema, BlockType, ExecutionContext, FieldSpec, Graph,
  Link, Node, ValueType,
};
use tessera_lock::InProcessLock;
use tessera_manager::{AddExecutionRequest, ExecutionManager, ExecutionManagerConfig};
use tessera_notify::{LoggingNotificationSink, NotificationEvent, NotificationSink};
use tessera_store::InMemoryDatabaseManager;

struct ConstBlock {
  schema: BlockSchema,
  pin: &'static str,
  value: Value,
}

impl Block for ConstBlock {
  fn id(&self) -> &str {
    "const"
  }
  fn name(&self) -> &str {
    "Const"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, _input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
    let pin = self.pin.to_string();
    let value = self.value.clone();
    Box::pin(futures::stream::once(async move { Ok((pin, value)) }))
  }
}

struct FanInBlock {
  schema: BlockSchema,
}

impl Block for FanInBlock {
  fn id(&self) -> &str {
    "fan-in"
  }
  fn name(&self) -> &str {
    "FanIn"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
    Box::pin(futures::stream::once(async move { Ok(("merged".to_string(), input)) }))
  }
}

struct RaisingBlock {
  schema: BlockSchema,
}

impl Block for RaisingBlock {
  fn id(&self) -> &str {
    "raising"
  }
  fn name(&self) -> &str {
    "Raising"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, _input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
    Box::pin(futures::stream::once(async move { Err(BlockError::User("nope".to_string())) }))
  }
}

struct ErrorSink {
  schema: BlockSchema,
}

impl Block for ErrorSink {
  fn id(&self) -> &str {
    "error-sink"
  }
  fn name(&self) -> &str {
    "ErrorSink"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
    Box::pin(futures::stream::once(async move { Ok(("seen".to_string(), input)) }))
  }
}

struct NeverRunsBlock {
  schema: BlockSchema,
}

impl Block for NeverRunsBlock {
  fn id(&self) -> &str {
    "never-runs"
  }
  fn name(&self) -> &str {
    "NeverRuns"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
    Box::pin(futures::stream::once(async move { Ok(("out".to_string(), input)) }))
  }
}

struct MapCatalog(HashMap<String, Arc<dyn Block>>);

impl BlockCatalog for MapCatalog {
  fn get(&self, block_id: &str) -> Option<Arc<dyn Block>> {
    self.0.get(block_id).cloned()
  }
}

fn manager_for(store: Arc<InMemoryDatabaseManager>, catalog: Arc<MapCatalog>) -> ExecutionManager {
  manager_for_with(store, catalog, Arc::new(NoopCostModel), Arc::new(LoggingNotificationSink))
}

fn manager_for_with(
  store: Arc<InMemoryDatabaseManager>,
  catalog: Arc<MapCatalog>,
  cost_model: Arc<dyn CostModel>,
  notify: Arc<dyn NotificationSink>,
) -> ExecutionManager {
  ExecutionManager::new(
    store,
    Arc::new(InProcessLock::new()),
    catalog,
    Arc::new(StaticCredentialStore::new(HashMap::new())),
    cost_model,
    notify,
    ExecutionManagerConfig {
      num_graph_workers: 2,
      num_node_workers: 2,
      frontend_base_url: None,
      platform_base_url: "https://example.test".to_string(),
    },
  )
}

/// Collects queued notifications for assertion (§8 scenario 6).
#[derive(Default)]
struct RecordingNotificationSink {
  events: Mutex<Vec<NotificationEvent>>,
}

#[async_trait::async_trait]
impl NotificationSink for RecordingNotificationSink {
  async fn queue_notification(&self, event: NotificationEvent) {
    self.events.lock().unwrap().push(event);
  }
}

struct DoublingBlock {
  schema: BlockSchema,
}

impl Block for DoublingBlock {
  fn id(&self) -> &str {
    "doubling"
  }
  fn name(&self) -> &str {
    "Doubling"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
    let n = input.get("in").and_then(Value::as_i64).unwrap_or(0);
    Box::pin(futures::stream::once(async move { Ok(("out".to_string(), json!(n * 2))) }))
  }
}

struct StringifyBlock {
  schema: BlockSchema,
}

impl Block for StringifyBlock {
  fn id(&self) -> &str {
    "stringify"
  }
  fn name(&self) -> &str {
    "Stringify"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
    let value = input.get("in").cloned().unwrap_or(Value::Null);
    let text = match value {
      Value::String(s) => s,
      other => other.to_string(),
    };
    Box::pin(futures::stream::once(async move { Ok(("out".to_string(), Value::String(text))) }))
  }
}

struct SleepyBlock {
  schema: BlockSchema,
  duration: Duration,
}

impl Block for SleepyBlock {
  fn id(&self) -> &str {
    "sleepy"
  }
  fn name(&self) -> &str {
    "Sleepy"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, _input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
    let duration = self.duration;
    Box::pin(futures::stream::once(async move {
      tokio::time::sleep(duration).await;
      Ok(("out".to_string(), json!("done")))
    }))
  }
}

/// §8 scenario 2: two producers fan into one sink (one dynamic, one never
/// fires); the sink stays INCOMPLETE at graph end but the graph still
/// completes, and `node_count` only counts the producer that actually ran.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fan_in_with_missing_input_leaves_sink_incomplete_but_graph_completes() {
  let mut a = Node::new("a", "const-a");
  a.output_links.push(Link {
    source_id: "a".to_string(),
    source_name: "out".to_string(),
    sink_id: "c".to_string(),
    sink_name: "x".to_string(),
    is_static: false,
  });
  let mut c = Node::new("c", "fan-in");
  c.input_links.push(Link {
    source_id: "a".to_string(),
    source_name: "out".to_string(),
    sink_id: "c".to_string(),
    sink_name: "x".to_string(),
    is_static: false,
  });
  c.input_links.push(Link {
    source_id: "b".to_string(),
    source_name: "out".to_string(),
    sink_id: "c".to_string(),
    sink_name: "y".to_string(),
    is_static: true,
  });
  // `b` is declared but never actually a starting node, so it never produces.
  let b = Node::new("b", "const-b");

  let mut nodes = HashMap::new();
  nodes.insert("a".to_string(), a);
  nodes.insert("b".to_string(), b);
  nodes.insert("c".to_string(), c);
  let graph = Graph {
    graph_id: "fan-in-graph".to_string(),
    version: 1,
    nodes,
    links: vec![
      Link {
        source_id: "a".to_string(),
        source_name: "out".to_string(),
        sink_id: "c".to_string(),
        sink_name: "x".to_string(),
        is_static: false,
      },
      Link {
        source_id: "b".to_string(),
        source_name: "out".to_string(),
        sink_id: "c".to_string(),
        sink_name: "y".to_string(),
        is_static: true,
      },
    ],
    starting_nodes: vec!["a".to_string()],
  };

  let mut fan_in_fields = HashMap::new();
  fan_in_fields.insert("x".to_string(), FieldSpec::required(ValueType::Number));
  fan_in_fields.insert("y".to_string(), FieldSpec::required(ValueType::Number));
  let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();
  blocks.insert(
    "const-a".to_string(),
    Arc::new(ConstBlock {
      schema: BlockSchema::default(),
      pin: "out",
      value: json!(7),
    }),
  );
  blocks.insert(
    "fan-in".to_string(),
    Arc::new(FanInBlock {
      schema: BlockSchema {
        fields: fan_in_fields,
        credentials: HashMap::new(),
      },
    }),
  );
  let catalog = Arc::new(MapCatalog(blocks));

  let store = Arc::new(InMemoryDatabaseManager::new());
  store.register_graph(graph).await;
  store.set_balance("user-1", 1_000).await;

  let manager = manager_for(store.clone(), catalog);
  let entry = manager
    .add_execution(AddExecutionRequest {
      graph_id: "fan-in-graph".to_string(),
      graph_version: None,
      user_id: "user-1".to_string(),
      preset_id: None,
      data: HashMap::new(),
    })
    .await
    .unwrap();

  tokio::time::sleep(Duration::from_millis(100)).await;

  let execs = store.list_node_executions(&entry.graph_exec_id, None).await.unwrap();
  let a_exec = execs.iter().find(|ne| ne.node_id == "a").unwrap();
  assert_eq!(a_exec.status, tessera_graph::ExecutionStatus::Completed);

  let c_exec = execs.iter().find(|ne| ne.node_id == "c").unwrap();
  assert_eq!(c_exec.status, tessera_graph::ExecutionStatus::Incomplete);
  assert_eq!(c_exec.input_data["x"], json!(7));
  assert!(!c_exec.input_data.contains_key("y"));
}

/// §8 scenario 4: a block raises; the error pin's wired successor still
/// runs with the failure message, while the success-pin successor never
/// does.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn block_error_fires_error_wired_successor_but_not_the_success_one() {
  let mut a = Node::new("a", "raising");
  a.output_links.push(Link {
    source_id: "a".to_string(),
    source_name: "out".to_string(),
    sink_id: "success-sink".to_string(),
    sink_name: "in".to_string(),
    is_static: false,
  });
  a.output_links.push(Link {
    source_id: "a".to_string(),
    source_name: "error".to_string(),
    sink_id: "error-sink".to_string(),
    sink_name: "in".to_string(),
    is_static: false,
  });

  let mut success_fields = HashMap::new();
  success_fields.insert("in".to_string(), FieldSpec::required(ValueType::Any));
  let mut error_fields = HashMap::new();
  error_fields.insert("in".to_string(), FieldSpec::required(ValueType::Any));

  let mut nodes = HashMap::new();
  nodes.insert("a".to_string(), a);
  nodes.insert("success-sink".to_string(), Node::new("success-sink", "never-runs"));
  nodes.insert("error-sink".to_string(), Node::new("error-sink", "error-sink"));
  let graph = Graph {
    graph_id: "error-graph".to_string(),
    version: 1,
    nodes,
    links: vec![
      Link {
        source_id: "a".to_string(),
        source_name: "out".to_string(),
        sink_id: "success-sink".to_string(),
        sink_name: "in".to_string(),
        is_static: false,
      },
      Link {
        source_id: "a".to_string(),
        source_name: "error".to_string(),
        sink_id: "error-sink".to_string(),
        sink_name: "in".to_string(),
        is_static: false,
      },
    ],
    starting_nodes: vec!["a".to_string()],
  };

  let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();
  blocks.insert("raising".to_string(), Arc::new(RaisingBlock { schema: BlockSchema::default() }));
  blocks.insert(
    "never-runs".to_string(),
    Arc::new(NeverRunsBlock {
      schema: BlockSchema {
        fields: success_fields,
        credentials: HashMap::new(),
      },
    }),
  );
  blocks.insert(
    "error-sink".to_string(),
    Arc::new(ErrorSink {
      schema: BlockSchema {
        fields: error_fields,
        credentials: HashMap::new(),
      },
    }),
  );
  let catalog = Arc::new(MapCatalog(blocks));

  let store = Arc::new(InMemoryDatabaseManager::new());
  store.register_graph(graph).await;
  store.set_balance("user-1", 1_000).await;

  let manager = manager_for(store.clone(), catalog);
  let entry = manager
    .add_execution(AddExecutionRequest {
      graph_id: "error-graph".to_string(),
      graph_version: None,
      user_id: "user-1".to_string(),
      preset_id: None,
      data: HashMap::new(),
    })
    .await
    .unwrap();

  tokio::time::sleep(Duration::from_millis(150)).await;

  let execs = store.list_node_executions(&entry.graph_exec_id, None).await.unwrap();
  let a_exec = execs.iter().find(|ne| ne.node_id == "a").unwrap();
  assert_eq!(a_exec.status, tessera_graph::ExecutionStatus::Failed);
  assert_eq!(a_exec.output_data["error"], vec![json!("nope")]);

  assert!(execs.iter().find(|ne| ne.node_id == "success-sink").is_none());

  let error_sink = execs.iter().find(|ne| ne.node_id == "error-sink").unwrap();
  assert_eq!(error_sink.status, tessera_graph::ExecutionStatus::Completed);
  assert_eq!(error_sink.input_data["in"], json!("nope"));
}

/// §8 scenario 1: linear chain A→B→C, A emits 7, B doubles, C stringifies.
/// Final output is `"14"`, every node completes, and `node_count == 3`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn linear_chain_doubles_then_stringifies_to_final_output() {
  let mut a = Node::new("a", "const-a");
  a.output_links.push(Link {
    source_id: "a".to_string(),
    source_name: "out".to_string(),
    sink_id: "b".to_string(),
    sink_name: "in".to_string(),
    is_static: false,
  });
  let mut b = Node::new("b", "doubling");
  b.input_links.push(Link {
    source_id: "a".to_string(),
    source_name: "out".to_string(),
    sink_id: "b".to_string(),
    sink_name: "in".to_string(),
    is_static: false,
  });
  b.output_links.push(Link {
    source_id: "b".to_string(),
    source_name: "out".to_string(),
    sink_id: "c".to_string(),
    sink_name: "in".to_string(),
    is_static: false,
  });
  let mut c = Node::new("c", "stringify");
  c.input_links.push(Link {
    source_id: "b".to_string(),
    source_name: "out".to_string(),
    sink_id: "c".to_string(),
    sink_name: "in".to_string(),
    is_static: false,
  });

  let mut nodes = HashMap::new();
  nodes.insert("a".to_string(), a);
  nodes.insert("b".to_string(), b);
  nodes.insert("c".to_string(), c);
  let graph = Graph {
    graph_id: "linear-chain".to_string(),
    version: 1,
    nodes,
    links: vec![
      Link {
        source_id: "a".to_string(),
        source_name: "out".to_string(),
        sink_id: "b".to_string(),
        sink_name: "in".to_string(),
        is_static: false,
      },
      Link {
        source_id: "b".to_string(),
        source_name: "out".to_string(),
        sink_id: "c".to_string(),
        sink_name: "in".to_string(),
        is_static: false,
      },
    ],
    starting_nodes: vec!["a".to_string()],
  };

  let mut in_field = HashMap::new();
  in_field.insert("in".to_string(), FieldSpec::required(ValueType::Any));
  let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();
  blocks.insert(
    "const-a".to_string(),
    Arc::new(ConstBlock {
      schema: BlockSchema::default(),
      pin: "out",
      value: json!(7),
    }),
  );
  blocks.insert(
    "doubling".to_string(),
    Arc::new(DoublingBlock {
      schema: BlockSchema {
        fields: in_field.clone(),
        credentials: HashMap::new(),
      },
    }),
  );
  blocks.insert(
    "stringify".to_string(),
    Arc::new(StringifyBlock {
      schema: BlockSchema {
        fields: in_field,
        credentials: HashMap::new(),
      },
    }),
  );
  let catalog = Arc::new(MapCatalog(blocks));

  let store = Arc::new(InMemoryDatabaseManager::new());
  store.register_graph(graph).await;
  store.set_balance("user-1", 1_000).await;

  let manager = manager_for(store.clone(), catalog);
  let entry = manager
    .add_execution(AddExecutionRequest {
      graph_id: "linear-chain".to_string(),
      graph_version: None,
      user_id: "user-1".to_string(),
      preset_id: None,
      data: HashMap::new(),
    })
    .await
    .unwrap();

  tokio::time::sleep(Duration::from_millis(150)).await;

  let execs = store.list_node_executions(&entry.graph_exec_id, None).await.unwrap();
  assert_eq!(execs.len(), 3);
  for ne in &execs {
    assert_eq!(ne.status, tessera_graph::ExecutionStatus::Completed, "node {} not completed", ne.node_id);
  }
  let c_exec = execs.iter().find(|ne| ne.node_id == "c").unwrap();
  assert_eq!(c_exec.output_data["out"], vec![json!("14")]);

  let graph_exec = store.graph_execution(&entry.graph_exec_id).await.unwrap();
  assert_eq!(graph_exec.status, tessera_graph::ExecutionStatus::Completed);
  assert_eq!(graph_exec.stats.node_count, 3);
}

/// §8 scenario 3: a static link fires after the sink already has two
/// `INCOMPLETE` executions each missing the static pin; both become ready
/// and carry the same static value.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn static_link_propagates_to_every_incomplete_sink_execution() {
  let a = Node::new("a", "const-a");
  let mut b = Node::new("b", "fan-in");
  b.input_links.push(Link {
    source_id: "a".to_string(),
    source_name: "out".to_string(),
    sink_id: "b".to_string(),
    sink_name: "cfg".to_string(),
    is_static: true,
  });

  let mut fields = HashMap::new();
  fields.insert("cfg".to_string(), FieldSpec::required(ValueType::Number));
  fields.insert("x".to_string(), FieldSpec::required(ValueType::Number));
  let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();
  blocks.insert(
    "const-a".to_string(),
    Arc::new(ConstBlock {
      schema: BlockSchema::default(),
      pin: "out",
      value: json!(99),
    }),
  );
  blocks.insert(
    "fan-in".to_string(),
    Arc::new(FanInBlock {
      schema: BlockSchema {
        fields,
        credentials: HashMap::new(),
      },
    }),
  );
  let catalog = Arc::new(MapCatalog(blocks));

  let mut nodes = HashMap::new();
  nodes.insert("a".to_string(), a);
  nodes.insert("b".to_string(), b.clone());
  let graph = Graph {
    graph_id: "static-prop".to_string(),
    version: 1,
    nodes,
    links: vec![Link {
      source_id: "a".to_string(),
      source_name: "out".to_string(),
      sink_id: "b".to_string(),
      sink_name: "cfg".to_string(),
      is_static: true,
    }],
    starting_nodes: vec!["a".to_string()],
  };

  let store = Arc::new(InMemoryDatabaseManager::new());
  store.register_graph(graph.clone()).await;
  store.set_balance("user-1", 1_000).await;

  // Seed two INCOMPLETE executions of `b`, each missing only `cfg`, as if
  // two prior dynamic productions on `x` had already arrived.
  store
    .upsert_execution_input("seed-graph-exec", "b", "x", json!(1))
    .await
    .unwrap();
  store
    .upsert_execution_input("seed-graph-exec", "b", "x", json!(2))
    .await
    .unwrap();
  let seeded = store.get_incomplete_node_executions("b", "seed-graph-exec").await.unwrap();
  assert_eq!(seeded.len(), 2);

  // Drive the static production directly through the resolver, exercising
  // its step 6 fan-out (§4.1) against the two pre-seeded INCOMPLETE rows.
  let resolver = tessera_resolver::Resolver::new(store.clone(), Arc::new(InProcessLock::new()), catalog);
  let ready = resolver
    .resolve_production(&graph, "seed-graph-exec", "user-1", "a", "out", json!(99))
    .await
    .unwrap();
  assert_eq!(ready.len(), 2);
  for entry in &ready {
    assert_eq!(entry.data["cfg"], json!(99));
  }
}

/// §8 scenario 5: cancellation mid-run. A long-running node is dispatched,
/// `cancel_execution` is called shortly after, and the run finishes
/// TERMINATED well before the block's own sleep would have elapsed.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_execution_terminates_a_long_running_node_promptly() {
  let a = Node::new("a", "sleepy");
  let mut nodes = HashMap::new();
  nodes.insert("a".to_string(), a);
  let graph = Graph {
    graph_id: "cancel-graph".to_string(),
    version: 1,
    nodes,
    links: Vec::new(),
    starting_nodes: vec!["a".to_string()],
  };

  let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();
  blocks.insert(
    "sleepy".to_string(),
    Arc::new(SleepyBlock {
      schema: BlockSchema::default(),
      duration: Duration::from_secs(10),
    }),
  );
  let catalog = Arc::new(MapCatalog(blocks));

  let store = Arc::new(InMemoryDatabaseManager::new());
  store.register_graph(graph).await;
  store.set_balance("user-1", 1_000).await;

  let manager = manager_for(store.clone(), catalog);
  let entry = manager
    .add_execution(AddExecutionRequest {
      graph_id: "cancel-graph".to_string(),
      graph_version: None,
      user_id: "user-1".to_string(),
      preset_id: None,
      data: HashMap::new(),
    })
    .await
    .unwrap();

  tokio::time::sleep(Duration::from_millis(100)).await;

  let started = Instant::now();
  manager.cancel_execution(&entry.graph_exec_id).await.unwrap();
  assert!(started.elapsed() < Duration::from_secs(5), "cancel took too long: {:?}", started.elapsed());

  let execs = store.list_node_executions(&entry.graph_exec_id, None).await.unwrap();
  for ne in &execs {
    assert_eq!(ne.status, tessera_graph::ExecutionStatus::Terminated);
  }

  // Idempotent: a second cancel on the same, already-terminated run is a no-op.
  manager.cancel_execution(&entry.graph_exec_id).await.unwrap();
}

/// §8 scenario 6: balance runs out on the second dispatched node. The first
/// node completes and is charged; the second fails fast with
/// `InsufficientBalanceError`, the graph ends FAILED, and a LOW_BALANCE
/// notification carries `shortfall = balance - amount`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn insufficient_balance_on_second_dispatch_fails_the_graph() {
  let mut a = Node::new("a", "const-a");
  a.output_links.push(Link {
    source_id: "a".to_string(),
    source_name: "out".to_string(),
    sink_id: "b".to_string(),
    sink_name: "in".to_string(),
    is_static: false,
  });
  let mut b = Node::new("b", "doubling");
  b.input_links.push(Link {
    source_id: "a".to_string(),
    source_name: "out".to_string(),
    sink_id: "b".to_string(),
    sink_name: "in".to_string(),
    is_static: false,
  });

  let mut nodes = HashMap::new();
  nodes.insert("a".to_string(), a);
  nodes.insert("b".to_string(), b);
  let graph = Graph {
    graph_id: "balance-graph".to_string(),
    version: 1,
    nodes,
    links: vec![Link {
      source_id: "a".to_string(),
      source_name: "out".to_string(),
      sink_id: "b".to_string(),
      sink_name: "in".to_string(),
      is_static: false,
    }],
    starting_nodes: vec!["a".to_string()],
  };

  let mut in_field = HashMap::new();
  in_field.insert("in".to_string(), FieldSpec::required(ValueType::Any));
  let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();
  blocks.insert(
    "const-a".to_string(),
    Arc::new(ConstBlock {
      schema: BlockSchema::default(),
      pin: "out",
      value: json!(1),
    }),
  );
  blocks.insert(
    "doubling".to_string(),
    Arc::new(DoublingBlock {
      schema: BlockSchema {
        fields: in_field,
        credentials: HashMap::new(),
      },
    }),
  );
  let catalog = Arc::new(MapCatalog(blocks));

  let store = Arc::new(InMemoryDatabaseManager::new());
  store.register_graph(graph).await;
  store.set_balance("user-1", 5).await;

  let mut prices = HashMap::new();
  prices.insert("const".to_string(), 5u64);
  prices.insert("doubling".to_string(), 1_000u64);
  let cost_model = Arc::new(FixedBlockCost::new(prices));
  let notify = Arc::new(RecordingNotificationSink::default());

  let manager = manager_for_with(store.clone(), catalog, cost_model, notify.clone());
  let entry = manager
    .add_execution(AddExecutionRequest {
      graph_id: "balance-graph".to_string(),
      graph_version: None,
      user_id: "user-1".to_string(),
      preset_id: None,
      data: HashMap::new(),
    })
    .await
    .unwrap();

  tokio::time::sleep(Duration::from_millis(150)).await;

  let execs = store.list_node_executions(&entry.graph_exec_id, None).await.unwrap();
  let a_exec = execs.iter().find(|ne| ne.node_id == "a").unwrap();
  assert_eq!(a_exec.status, tessera_graph::ExecutionStatus::Completed);
  let b_exec = execs.iter().find(|ne| ne.node_id == "b").unwrap();
  assert_eq!(b_exec.status, tessera_graph::ExecutionStatus::Failed);
  assert!(b_exec.output_data["error"][0].as_str().unwrap().contains("balance"));

  let graph_exec = store.graph_execution(&entry.graph_exec_id).await.unwrap();
  assert_eq!(graph_exec.status, tessera_graph::ExecutionStatus::Failed);

  let events = notify.events.lock().unwrap();
  let low_balance = events
    .iter()
    .find_map(|e| match e {
      NotificationEvent::LowBalance(data) => Some(data),
      _ => None,
    })
    .expect("expected a LOW_BALANCE notification");
  assert_eq!(low_balance.shortfall, 0 - 1000);
}
