use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tessera_credit::CostModel;
use tessera_executor::{CredentialStore, NodeExecutor};
use tessera_graph::{
  Block, BlockCatalog, BlockInput, BlockType, ExecutionStatus, Graph, GraphExecutionEntry, Node,
  NodeExecutionEntry,
};
use tessera_lock::DistributedLock;
use tessera_notify::NotificationSink;
use tessera_resolver::{validate_input, Resolver};
use tessera_scheduler::{GraphScheduler, SchedulerConfig};
use tessera_store::{DatabaseManager, ExecutionUpdate};
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::ExecutionManagerConfig;
use crate::error::ManagerError;
use crate::request::AddExecutionRequest;

struct ActiveRun {
  cancel: CancellationToken,
  done: Arc<Notify>,
}

struct Inner {
  store: Arc<dyn DatabaseManager>,
  catalog: Arc<dyn BlockCatalog>,
  credentials: Arc<dyn CredentialStore>,
  scheduler: GraphScheduler,
  config: ExecutionManagerConfig,
  active: StdMutex<HashMap<String, ActiveRun>>,
  semaphore: Arc<Semaphore>,
  intake_tx: mpsc::UnboundedSender<(Arc<Graph>, GraphExecutionEntry)>,
}

/// The Execution Manager (§4.5): validates and admits new runs, hands them
/// to a bounded pool of graph-worker tasks, and cancels in-flight runs on
/// request. One `ExecutionManager` owns exactly one intake queue and one
/// graph-worker pool; it is cheap to clone (`Arc` internally) and meant to
/// be shared across every RPC handler in the process.
#[derive(Clone)]
pub struct ExecutionManager {
  inner: Arc<Inner>,
}

impl ExecutionManager {
  pub fn new(
    store: Arc<dyn DatabaseManager>,
    lock: Arc<dyn DistributedLock>,
    catalog: Arc<dyn BlockCatalog>,
    credentials: Arc<dyn CredentialStore>,
    cost_model: Arc<dyn CostModel>,
    notify: Arc<dyn NotificationSink>,
    config: ExecutionManagerConfig,
  ) -> Self {
    let resolver = Arc::new(Resolver::new(store.clone(), lock, catalog.clone()));
    let executor = Arc::new(NodeExecutor::new(store.clone(), catalog.clone(), credentials.clone(), resolver));
    let scheduler = GraphScheduler::new(
      store.clone(),
      catalog.clone(),
      notify,
      cost_model,
      executor,
      SchedulerConfig {
        num_node_workers: config.num_node_workers,
        frontend_base_url: config.frontend_base_url.clone(),
        platform_base_url: config.platform_base_url.clone(),
      },
    );

    let (intake_tx, intake_rx) = mpsc::unbounded_channel();
    let inner = Arc::new(Inner {
      store,
      catalog,
      credentials,
      scheduler,
      semaphore: Arc::new(Semaphore::new(config.num_graph_workers.max(1))),
      config,
      active: StdMutex::new(HashMap::new()),
      intake_tx,
    });

    tokio::spawn(Self::run_loop(inner.clone(), intake_rx));
    Self { inner }
  }

  /// The graph-worker pool: pops graph runs off the intake queue and hands
  /// each to `scheduler.run`, limiting concurrency to `num_graph_workers`
  /// (§4.5). `Semaphore::acquire_owned` backpressures the loop itself —
  /// nothing is popped off the queue until a worker slot is free.
  async fn run_loop(
    inner: Arc<Inner>,
    mut intake_rx: mpsc::UnboundedReceiver<(Arc<Graph>, GraphExecutionEntry)>,
  ) {
    while let Some((graph, entry)) = intake_rx.recv().await {
      let permit = inner
        .semaphore
        .clone()
        .acquire_owned()
        .await
        .expect("execution manager semaphore never closes");
      let graph_exec_id = entry.graph_exec_id.clone();
      let cancel = CancellationToken::new();
      let done = Arc::new(Notify::new());
      inner
        .active
        .lock()
        .expect("active run registry poisoned")
        .insert(graph_exec_id.clone(), ActiveRun { cancel: cancel.clone(), done: done.clone() });

      let inner = inner.clone();
      tokio::spawn(async move {
        let _permit = permit;
        let _stats = inner.scheduler.run(graph, entry, cancel).await;
        inner.active.lock().expect("active run registry poisoned").remove(&graph_exec_id);
        done.notify_one();
      });
    }
  }

  /// §4.5 steps 1-5: load and revalidate the graph, check every declared
  /// credential field against the credential store, extract and validate
  /// each starting node's seed input, persist the new `GraphExecution`, and
  /// push it onto the intake queue.
  #[tracing::instrument(skip(self, req), fields(graph_id = %req.graph_id, user_id = %req.user_id))]
  pub async fn add_execution(&self, req: AddExecutionRequest) -> Result<GraphExecutionEntry, ManagerError> {
    let graph = self.inner.store.get_graph(&req.graph_id, req.graph_version).await?;
    graph.validate_graph(true)?;

    for node in graph.nodes.values() {
      let Some(block) = self.inner.catalog.get(&node.block_id) else {
        continue;
      };
      self.validate_node_credentials(&req.user_id, node, block.as_ref()).await?;
    }

    let mut seed_inputs = Vec::new();
    for node_id in &graph.starting_nodes {
      let Some(node) = graph.get_node(node_id) else { continue };
      let Some(block) = self.inner.catalog.get(&node.block_id) else { continue };
      if block.block_type() == BlockType::Note {
        continue;
      }

      let input = self.extract_starting_input(&req, node, block.as_ref())?;
      match validate_input(node, input, self.inner.catalog.as_ref(), true) {
        Ok((validated, _block_name)) => seed_inputs.push((node.node_id.clone(), validated)),
        Err(err) => {
          return Err(ManagerError::InputValidation { node_id: node.node_id.clone(), source: err });
        }
      }
    }

    if seed_inputs.is_empty() {
      return Err(ManagerError::NoStartingNodes);
    }

    let created = self
      .inner
      .store
      .create_graph_execution(&graph, &req.user_id, req.preset_id, seed_inputs)
      .await?;
    self.inner.store.send_execution_update(ExecutionUpdate::Graph(created.graph_exec.clone())).await?;

    let start_node_execs: Vec<NodeExecutionEntry> = created
      .node_executions
      .into_iter()
      .map(|ne| NodeExecutionEntry {
        user_id: req.user_id.clone(),
        graph_exec_id: ne.graph_exec_id.clone(),
        graph_id: graph.graph_id.clone(),
        node_exec_id: ne.node_exec_id,
        node_id: ne.node_id,
        block_id: ne.block_id,
        data: ne.input_data,
      })
      .collect();

    let entry = GraphExecutionEntry {
      user_id: req.user_id,
      graph_id: graph.graph_id.clone(),
      graph_version: graph.version,
      graph_exec_id: created.graph_exec.graph_exec_id.clone(),
      start_node_execs,
    };

    let _ = self.inner.intake_tx.send((Arc::new(graph), entry.clone()));
    Ok(entry)
  }

  /// §4.5 `cancel_execution`: idempotent. The second call on an
  /// already-terminated (or never-active) run just re-applies the terminal
  /// status sweep, which is itself idempotent (§3).
  #[tracing::instrument(skip(self))]
  pub async fn cancel_execution(&self, graph_exec_id: &str) -> Result<(), ManagerError> {
    let active = self.inner.active.lock().expect("active run registry poisoned").get(graph_exec_id).map(|run| {
      (run.cancel.clone(), run.done.clone())
    });

    if let Some((cancel, done)) = active {
      if !cancel.is_cancelled() {
        cancel.cancel();
      }
      done.notified().await;
    } else {
      tracing::warn!(graph_exec_id, "cancel_execution: no active run found, applying terminal sweep anyway");
    }

    self.inner.store.update_graph_execution_status(graph_exec_id, ExecutionStatus::Terminated).await?;

    let pending = self
      .inner
      .store
      .list_node_executions(
        graph_exec_id,
        Some(&[ExecutionStatus::Incomplete, ExecutionStatus::Queued, ExecutionStatus::Running]),
      )
      .await?;
    if !pending.is_empty() {
      let ids: Vec<String> = pending.into_iter().map(|ne| ne.node_exec_id).collect();
      self.inner.store.update_node_execution_status_batch(&ids, ExecutionStatus::Terminated).await?;
    }

    Ok(())
  }

  async fn validate_node_credentials(
    &self,
    user_id: &str,
    node: &Node,
    block: &dyn Block,
  ) -> Result<(), ManagerError> {
    for (field, spec) in block.input_schema().get_credentials_fields() {
      let Some(value) = node.input_default.get(field) else {
        return Err(ManagerError::MissingCredential { node_id: node.node_id.clone(), field: field.clone() });
      };
      let Some(credential_id) = value.get("id").and_then(serde_json::Value::as_str) else {
        return Err(ManagerError::MissingCredential { node_id: node.node_id.clone(), field: field.clone() });
      };

      let creds = self.inner.credentials.get_creds_by_id(user_id, credential_id).await?;
      let provider_matches = creds.get("provider").and_then(serde_json::Value::as_str) == Some(spec.provider.as_str());
      let type_matches =
        creds.get("type").and_then(serde_json::Value::as_str) == Some(spec.credential_type.as_str());
      if !provider_matches || !type_matches {
        return Err(ManagerError::CredentialMismatch {
          node_id: node.node_id.clone(),
          credential_id: credential_id.to_string(),
        });
      }
    }
    Ok(())
  }

  /// §4.5 step 1: project the request's raw `data` onto one starting node
  /// according to its block type. `NOTE` nodes never reach here (filtered by
  /// the caller); every other block type either has no special shaping
  /// (`Standard`, `Agent`, ...) or needs exactly one field pulled out of
  /// `req.data`.
  fn extract_starting_input(
    &self,
    req: &AddExecutionRequest,
    node: &Node,
    block: &dyn Block,
  ) -> Result<BlockInput, ManagerError> {
    let mut input = BlockInput::new();
    match block.block_type() {
      BlockType::Input => {
        if let Some(name) = node.input_default.get("name").and_then(serde_json::Value::as_str)
          && let Some(value) = req.data.get(name)
        {
          input.insert("value".to_string(), value.clone());
        }
      }
      BlockType::Webhook | BlockType::WebhookManual => {
        if let Some(webhook_id) = &node.webhook_id {
          let key = format!("webhook_{webhook_id}_payload");
          let Some(value) = req.data.get(&key) else {
            return Err(ManagerError::MissingWebhookPayload {
              node_id: node.node_id.clone(),
              webhook_id: webhook_id.clone(),
            });
          };
          input.insert("payload".to_string(), value.clone());
        }
      }
      _ => {}
    }
    Ok(input)
  }
}
