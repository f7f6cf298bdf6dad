use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tessera_credit::{execution_usage_cost, CostModel, InsufficientBalanceError, UsageTransactionMetadata};
use tessera_executor::NodeExecutor;
use tessera_graph::{
  Block, BlockCatalog, ExecutionStatus, Graph, GraphExecutionEntry, GraphExecutionStats, NodeExecutionEntry,
};
use tessera_notify::{LowBalanceData, NotificationEvent, NotificationSink};
use tessera_store::DatabaseManager;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::ChargeError;
use crate::pool::{Completion, NodeWorkerPool};

/// Runs one graph execution to completion (§4.3). Owns no cross-run state:
/// a fresh node-worker pool and ready-queue are created for every call to
/// [`GraphScheduler::run`], so the scheduler itself can be shared (`Arc`)
/// across concurrently-running graphs.
pub struct GraphScheduler {
  store: Arc<dyn DatabaseManager>,
  catalog: Arc<dyn BlockCatalog>,
  notify: Arc<dyn NotificationSink>,
  cost_model: Arc<dyn CostModel>,
  executor: Arc<NodeExecutor>,
  config: SchedulerConfig,
}

impl GraphScheduler {
  pub fn new(
    store: Arc<dyn DatabaseManager>,
    catalog: Arc<dyn BlockCatalog>,
    notify: Arc<dyn NotificationSink>,
    cost_model: Arc<dyn CostModel>,
    executor: Arc<NodeExecutor>,
    config: SchedulerConfig,
  ) -> Self {
    Self {
      store,
      catalog,
      notify,
      cost_model,
      executor,
      config,
    }
  }

  /// §4.3's main loop: seed the ready-queue from the run's starting node
  /// executions, dispatch one node at a time per unique `node_id` (the
  /// per-node serialization invariant, §3), charge usage before every
  /// dispatch, and keep folding completions back into the run's stats and
  /// successor queue until the queue empties with nothing left running.
  #[tracing::instrument(name = "graph_execute", skip(self, graph, graph_exec, cancel), fields(graph_exec_id = %graph_exec.graph_exec_id))]
  pub async fn run(
    &self,
    graph: Arc<Graph>,
    graph_exec: GraphExecutionEntry,
    cancel: CancellationToken,
  ) -> GraphExecutionStats {
    let graph_exec_id = graph_exec.graph_exec_id.clone();
    let start = Instant::now();
    let _ = self.store.update_graph_execution_start_time(&graph_exec_id).await;

    let mut queue: VecDeque<NodeExecutionEntry> = graph_exec.start_node_execs.into_iter().collect();
    let mut running: HashSet<String> = HashSet::new();
    let (pool, mut completions) = NodeWorkerPool::new(self.config.num_node_workers);
    let mut execution_stats = GraphExecutionStats::default();
    let mut exec_cost_counter: u64 = 0;
    let status = ExecutionStatus::Running;
    let mut terminated = false;

    // A second task watches the same cancellation token so that a node
    // execution wedged deep inside a block still gets torn down promptly,
    // independent of whatever the main loop below happens to be waiting on
    // (§4.3 Cancellation, §5). `watcher_stop` lets the main loop retire it
    // cleanly on every other exit path.
    let watcher_stop = CancellationToken::new();
    let watcher = tokio::spawn({
      let cancel = cancel.clone();
      let watcher_stop = watcher_stop.clone();
      let pool = pool.clone();
      async move {
        tokio::select! {
          _ = cancel.cancelled() => pool.terminate(),
          _ = watcher_stop.cancelled() => {}
        }
      }
    });

    'run: while let Some(entry) = queue.pop_front() {
      if cancel.is_cancelled() {
        terminated = true;
        break;
      }

      // Per-node serialization: a second ready entry for a node already in
      // flight waits for the first to finish before dispatching.
      while running.contains(&entry.node_id) {
        tokio::select! {
          _ = cancel.cancelled() => { terminated = true; break 'run; }
          completion = completions.recv() => {
            match completion {
              Some(completion) => self.fold_completion(&graph_exec_id, &mut running, &mut execution_stats, &mut queue, status, completion).await,
              None => break,
            }
          }
        }
      }

      match self.charge_usage(&graph_exec_id, &entry, &mut exec_cost_counter, &mut execution_stats).await {
        Ok(()) => {}
        Err(ChargeError::InsufficientBalance(err)) => {
          self.handle_insufficient_balance(&graph, &entry, &err).await;
          execution_stats.error = Some(err.to_string());
          self
            .store
            .update_graph_execution_stats(&graph_exec_id, execution_stats.clone(), Some(ExecutionStatus::Failed))
            .await
            .ok();
          watcher_stop.cancel();
          let _ = watcher.await;
          execution_stats.walltime = start.elapsed().as_secs_f64();
          self.send_agent_run_notification(&graph, &graph_exec_id, &execution_stats).await;
          return execution_stats;
        }
        Err(ChargeError::Store(err)) => {
          tracing::error!(error = %err, graph_exec_id, "scheduler: infrastructure error charging usage");
          execution_stats.error = Some(err.to_string());
          self
            .store
            .update_graph_execution_stats(&graph_exec_id, execution_stats.clone(), Some(ExecutionStatus::Failed))
            .await
            .ok();
          watcher_stop.cancel();
          let _ = watcher.await;
          execution_stats.walltime = start.elapsed().as_secs_f64();
          self.send_agent_run_notification(&graph, &graph_exec_id, &execution_stats).await;
          return execution_stats;
        }
      }

      running.insert(entry.node_id.clone());
      pool.submit(self.executor.clone(), graph.clone(), entry, cancel.clone());

      // Idle wait: nothing new to dispatch until either the queue gains an
      // entry (a completion fed a successor into it) or everything in
      // flight finishes.
      while queue.is_empty() && !running.is_empty() {
        if cancel.is_cancelled() {
          terminated = true;
          break 'run;
        }
        match tokio::time::timeout(Duration::from_secs(3), completions.recv()).await {
          Ok(Some(completion)) => {
            self.fold_completion(&graph_exec_id, &mut running, &mut execution_stats, &mut queue, status, completion).await
          }
          Ok(None) => break,
          Err(_elapsed) => continue,
        }
      }
    }

    watcher_stop.cancel();
    let _ = watcher.await;

    execution_stats.walltime = start.elapsed().as_secs_f64();
    let final_status = if terminated { ExecutionStatus::Terminated } else { ExecutionStatus::Completed };
    if terminated {
      execution_stats.error.get_or_insert_with(|| "cancelled".to_string());
    }
    self
      .store
      .update_graph_execution_stats(&graph_exec_id, execution_stats.clone(), Some(final_status))
      .await
      .ok();

    // Queued unconditionally, even on TERMINATED runs — an open design
    // question (§9) preserved verbatim rather than "fixed" without product
    // alignment.
    self.send_agent_run_notification(&graph, &graph_exec_id, &execution_stats).await;

    execution_stats
  }

  async fn fold_completion(
    &self,
    graph_exec_id: &str,
    running: &mut HashSet<String>,
    execution_stats: &mut GraphExecutionStats,
    queue: &mut VecDeque<NodeExecutionEntry>,
    status: ExecutionStatus,
    completion: Completion,
  ) {
    running.remove(&completion.node_id);
    let Some(outcome) = completion.outcome else {
      // Worker crash (§4.3 Failure semantics): fold nothing, the graph
      // continues. The node's own persisted status is whatever it was left
      // at — at-most-once delivery, not exactly-once (§1 Non-goals).
      return;
    };

    execution_stats.node_count += 1;
    execution_stats.nodes_walltime += outcome.stats.walltime;
    execution_stats.nodes_cputime += outcome.stats.cputime;
    if outcome.stats.error.is_some() {
      execution_stats.node_error_count += 1;
    }
    queue.extend(outcome.successors);

    let _ = self
      .store
      .update_graph_execution_stats(graph_exec_id, execution_stats.clone(), Some(status))
      .await;
  }

  /// §4.4: two charges per dispatch, the per-block cost and the tiered
  /// per-execution cost. Either one raising `InsufficientBalanceError`
  /// aborts the whole run.
  async fn charge_usage(
    &self,
    graph_exec_id: &str,
    entry: &NodeExecutionEntry,
    exec_cost_counter: &mut u64,
    execution_stats: &mut GraphExecutionStats,
  ) -> Result<(), ChargeError> {
    if let Some(block) = self.catalog.get(&entry.block_id) {
      let (cost, matching_filter) = self.cost_model.block_usage_cost(block.as_ref(), &entry.data);
      if cost > 0 {
        let metadata = UsageTransactionMetadata {
          graph_id: entry.graph_id.clone(),
          graph_exec_id: graph_exec_id.to_string(),
          node_id: Some(entry.node_id.clone()),
          node_exec_id: Some(entry.node_exec_id.clone()),
          block_id: Some(entry.block_id.clone()),
          block_name: Some(block.name().to_string()),
          matching_filter,
        };
        self.store.spend_credits(&entry.user_id, cost, metadata).await?;
        execution_stats.cost += cost;
      }
    } else {
      tracing::error!(block_id = %entry.block_id, node_id = %entry.node_id, "scheduler: block not found for usage charge");
    }

    *exec_cost_counter += 1;
    let (cost, counter) = execution_usage_cost(*exec_cost_counter);
    if cost > 0 {
      let metadata = UsageTransactionMetadata {
        graph_id: entry.graph_id.clone(),
        graph_exec_id: graph_exec_id.to_string(),
        node_id: None,
        node_exec_id: None,
        block_id: None,
        block_name: None,
        matching_filter: Some(serde_json::json!({ "execution_count": counter })),
      };
      self.store.spend_credits(&entry.user_id, cost, metadata).await?;
      execution_stats.cost += cost;
    }

    Ok(())
  }

  async fn handle_insufficient_balance(
    &self,
    graph: &Graph,
    entry: &NodeExecutionEntry,
    err: &InsufficientBalanceError,
  ) {
    let _ = self
      .store
      .upsert_execution_output(&entry.node_exec_id, "error", Value::String(err.to_string()))
      .await;
    let _ = self
      .store
      .update_node_execution_status(&entry.node_exec_id, ExecutionStatus::Failed, None)
      .await;

    let agent_name = self
      .store
      .get_graph_metadata(&graph.graph_id)
      .await
      .map(|meta| meta.name)
      .unwrap_or_else(|_| graph.graph_id.clone());

    self
      .notify
      .queue_notification(NotificationEvent::LowBalance(LowBalanceData {
        current_balance: err.balance,
        billing_page_link: format!("{}/profile/credits", self.config.billing_base_url()),
        shortfall: err.shortfall(),
        agent_name,
      }))
      .await;
  }

  async fn send_agent_run_notification(&self, graph: &Graph, graph_exec_id: &str, stats: &GraphExecutionStats) {
    let agent_name = self
      .store
      .get_graph_metadata(&graph.graph_id)
      .await
      .map(|meta| meta.name)
      .unwrap_or_else(|_| graph.graph_id.clone());

    let outputs = match self
      .store
      .list_node_executions(graph_exec_id, Some(&[ExecutionStatus::Completed]))
      .await
    {
      Ok(executions) => {
        let mut merged = serde_json::Map::new();
        for execution in executions {
          merged.insert(execution.node_id, serde_json::to_value(execution.output_data).unwrap_or(Value::Null));
        }
        Value::Object(merged)
      }
      Err(_) => Value::Null,
    };

    self
      .notify
      .queue_notification(NotificationEvent::AgentRun(tessera_notify::AgentRunData {
        outputs,
        agent_name,
        credits_used: stats.cost,
        execution_time_secs: stats.walltime,
        graph_id: graph.graph_id.clone(),
        node_count: stats.node_count,
      }))
      .await;
  }
}
