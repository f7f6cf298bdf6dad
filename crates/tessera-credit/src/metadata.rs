use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attached to every usage-transaction ledger entry so a balance history can
/// be traced back to the node execution that produced it (§4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTransactionMetadata {
  pub graph_id: String,
  pub graph_exec_id: String,
  pub node_id: Option<String>,
  pub node_exec_id: Option<String>,
  pub block_id: Option<String>,
  pub block_name: Option<String>,
  /// The filter value returned alongside a per-block cost, when the cost
  /// model's match was conditional on part of the input (§4.4 step 1).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub matching_filter: Option<Value>,
}

impl UsageTransactionMetadata {
  pub fn for_node(graph_id: impl Into<String>, graph_exec_id: impl Into<String>) -> Self {
    Self {
      graph_id: graph_id.into(),
      graph_exec_id: graph_exec_id.into(),
      node_id: None,
      node_exec_id: None,
      block_id: None,
      block_name: None,
      matching_filter: None,
    }
  }
}
