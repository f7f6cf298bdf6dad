use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::BlockInput;
use crate::status::ExecutionStatus;

/// Aggregate stats for one graph run (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphExecutionStats {
  pub walltime: f64,
  pub cputime: f64,
  pub node_count: u32,
  pub node_error_count: u32,
  pub nodes_walltime: f64,
  pub nodes_cputime: f64,
  pub cost: u64,
  pub error: Option<String>,
}

/// Per-node-execution stats (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeExecutionStats {
  pub walltime: f64,
  pub cputime: f64,
  pub input_size: usize,
  pub output_size: usize,
  pub error: Option<String>,
}

/// A persisted graph run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExecution {
  pub graph_exec_id: String,
  pub graph_id: String,
  pub graph_version: u32,
  pub user_id: String,
  pub preset_id: Option<String>,
  pub status: ExecutionStatus,
  pub stats: GraphExecutionStats,
}

/// A persisted node execution. `created_at` is a monotonically increasing
/// sequence used for FIFO tie-break among `INCOMPLETE` candidates (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
  pub node_exec_id: String,
  pub graph_exec_id: String,
  pub node_id: String,
  pub block_id: String,
  pub status: ExecutionStatus,
  pub input_data: BlockInput,
  /// Append-only, ordered by production time, per output pin.
  pub output_data: HashMap<String, Vec<Value>>,
  pub stats: NodeExecutionStats,
  pub created_at: u64,
}

impl NodeExecution {
  pub fn new(node_exec_id: String, graph_exec_id: String, node_id: String, block_id: String, created_at: u64) -> Self {
    Self {
      node_exec_id,
      graph_exec_id,
      node_id,
      block_id,
      status: ExecutionStatus::Incomplete,
      input_data: BlockInput::new(),
      output_data: HashMap::new(),
      stats: NodeExecutionStats::default(),
      created_at,
    }
  }
}

/// One node execution ready for dispatch, as carried on the ready-queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionEntry {
  pub user_id: String,
  pub graph_exec_id: String,
  pub graph_id: String,
  pub node_exec_id: String,
  pub node_id: String,
  pub block_id: String,
  pub data: BlockInput,
}

/// A graph run ready for dispatch onto a graph-worker, as put on the intake
/// queue by the Execution Manager (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExecutionEntry {
  pub user_id: String,
  pub graph_id: String,
  pub graph_version: u32,
  pub graph_exec_id: String,
  pub start_node_execs: Vec<NodeExecutionEntry>,
}
