use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde_json::Value;
use tessera_graph::{
  canonical_json, BlockCatalog, BlockType, ExecutionContext, ExecutionStatus, Graph,
  NodeExecutionEntry, NodeExecutionStats,
};
use tessera_resolver::{validate_input, Resolver};
use tessera_store::DatabaseManager;
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialStore;

/// What a node execution produced, regardless of whether the block itself
/// succeeded (§4.2). Node-level failures are contained here, never
/// propagated as a hard error to the scheduler (§7 Propagation policy).
pub struct RunOutcome {
  pub final_status: ExecutionStatus,
  pub stats: NodeExecutionStats,
  pub successors: Vec<NodeExecutionEntry>,
}

/// Runs one node execution to completion: validates input, shapes AGENT
/// input, acquires credentials, invokes the block, and feeds every produced
/// value through the resolver (§4.2).
pub struct NodeExecutor {
  store: Arc<dyn DatabaseManager>,
  catalog: Arc<dyn BlockCatalog>,
  credentials: Arc<dyn CredentialStore>,
  resolver: Arc<Resolver>,
}

impl NodeExecutor {
  pub fn new(
    store: Arc<dyn DatabaseManager>,
    catalog: Arc<dyn BlockCatalog>,
    credentials: Arc<dyn CredentialStore>,
    resolver: Arc<Resolver>,
  ) -> Self {
    Self {
      store,
      catalog,
      credentials,
      resolver,
    }
  }

  pub async fn run(&self, graph: &Graph, entry: NodeExecutionEntry, cancel: CancellationToken) -> RunOutcome {
    let start = Instant::now();
    let mut stats = NodeExecutionStats {
      input_size: canonical_json(&Value::Object(entry.data.clone().into_iter().collect())).len(),
      ..Default::default()
    };

    let Some(node) = graph.get_node(&entry.node_id) else {
      stats.error = Some(format!("node {} not found in graph", entry.node_id));
      return self.fail_without_execution(&entry, stats, start).await;
    };

    // step 1: pre-validate; the resolver already did the full merge, so this
    // is resolve_input=false.
    let validated = match validate_input(node, entry.data.clone(), self.catalog.as_ref(), false) {
      Ok((validated, _block_name)) => validated,
      Err(err) => {
        stats.error = Some(err.to_string());
        return self.fail_without_execution(&entry, stats, start).await;
      }
    };

    let Some(block) = self.catalog.get(&node.block_id) else {
      stats.error = Some(format!("block {} not found", node.block_id));
      return self.fail_without_execution(&entry, stats, start).await;
    };

    // step 2: AGENT blocks receive their input nested under `data`.
    let mut input_map = validated;
    if block.block_type() == BlockType::Agent {
      let mut wrapped = node.input_default.clone();
      wrapped.insert("data".to_string(), Value::Object(input_map.into_iter().collect()));
      input_map = wrapped;
    }

    // step 3: acquire a cluster-wide lock per declared credential field.
    let mut guards = Vec::new();
    let mut injected_credentials = HashMap::new();
    for (field, _spec) in block.input_schema().get_credentials_fields() {
      let Some(credential_id) = input_map.get(field).and_then(|v| v.get("id")).and_then(Value::as_str) else {
        continue;
      };
      match self.credentials.acquire(&entry.user_id, credential_id).await {
        Ok((payload, guard)) => {
          injected_credentials.insert(field.clone(), payload);
          guards.push(guard);
        }
        Err(err) => {
          stats.error = Some(err.to_string());
          return self.fail_without_execution(&entry, stats, start).await;
        }
      }
    }

    // step 4: ambient identifiers.
    let ctx = ExecutionContext {
      graph_id: entry.graph_id.clone(),
      graph_exec_id: entry.graph_exec_id.clone(),
      node_id: entry.node_id.clone(),
      node_exec_id: entry.node_exec_id.clone(),
      user_id: entry.user_id.clone(),
      credentials: injected_credentials,
    };

    // step 5: RUNNING, invoke, stream outputs through the resolver.
    let _ = self
      .store
      .update_node_execution_status(&entry.node_exec_id, ExecutionStatus::Running, None)
      .await;

    let input_value = Value::Object(input_map.into_iter().collect());
    let mut stream = block.execute(input_value, ctx);
    let mut successors = Vec::new();
    let mut output_size = 0usize;
    let mut block_failure: Option<String> = None;

    while !cancel.is_cancelled() {
      match stream.next().await {
        Some(Ok((name, value))) => {
          let canonical = canonical_json(&value);
          output_size += canonical.len();
          let stored = serde_json::from_str(&canonical).unwrap_or(value);
          let _ = self.store.upsert_execution_output(&entry.node_exec_id, &name, stored.clone()).await;
          if let Ok(entries) = self
            .resolver
            .resolve_production(graph, &entry.graph_exec_id, &entry.user_id, &entry.node_id, &name, stored)
            .await
          {
            successors.extend(entries);
          }
        }
        Some(Err(err)) => {
          block_failure = Some(err.message());
          break;
        }
        None => break,
      }
    }

    // release every credential lock held for this execution, on every exit
    // path including the break above.
    drop(guards);

    stats.output_size = output_size;
    stats.walltime = start.elapsed().as_secs_f64();

    let Some(message) = block_failure else {
      let _ = self
        .store
        .update_node_execution_status(&entry.node_exec_id, ExecutionStatus::Completed, None)
        .await;
      let _ = self.store.update_node_execution_stats(&entry.node_exec_id, stats.clone()).await;
      return RunOutcome {
        final_status: ExecutionStatus::Completed,
        stats,
        successors,
      };
    };

    // step 7: block-raised failure. Re-run the resolver against a
    // synthesized `error` production so that successors wired to the
    // producer's error pin still get a chance to run.
    let _ = self
      .store
      .upsert_execution_output(&entry.node_exec_id, "error", Value::String(message.clone()))
      .await;
    let _ = self
      .store
      .update_node_execution_status(&entry.node_exec_id, ExecutionStatus::Failed, None)
      .await;
    if let Ok(entries) = self
      .resolver
      .resolve_production(
        graph,
        &entry.graph_exec_id,
        &entry.user_id,
        &entry.node_id,
        "error",
        Value::String(message.clone()),
      )
      .await
    {
      successors.extend(entries);
    }
    stats.error = Some(message);
    let _ = self.store.update_node_execution_stats(&entry.node_exec_id, stats.clone()).await;
    RunOutcome {
      final_status: ExecutionStatus::Failed,
      stats,
      successors,
    }
  }

  /// §4.2 step 1 failure path: no execution ever started, so there is no
  /// output stream to drain and no credential lock was ever acquired.
  async fn fail_without_execution(
    &self,
    entry: &NodeExecutionEntry,
    mut stats: NodeExecutionStats,
    start: Instant,
  ) -> RunOutcome {
    let message = stats.error.clone().unwrap_or_else(|| "validation failed".to_string());
    let _ = self
      .store
      .upsert_execution_output(&entry.node_exec_id, "error", Value::String(message))
      .await;
    let _ = self
      .store
      .update_node_execution_status(&entry.node_exec_id, ExecutionStatus::Failed, None)
      .await;
    stats.walltime = start.elapsed().as_secs_f64();
    let _ = self.store.update_node_execution_stats(&entry.node_exec_id, stats.clone()).await;
    RunOutcome {
      final_status: ExecutionStatus::Failed,
      stats,
      successors: Vec::new(),
    }
  }
}
