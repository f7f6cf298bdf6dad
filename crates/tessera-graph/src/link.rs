use serde::{Deserialize, Serialize};

/// A directed edge carrying one pin's output into another pin's input.
///
/// `is_static` links cache their most recently produced value for every
/// future execution of the sink node (§3); dynamic links are consumed by
/// exactly one sink execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  pub source_id: String,
  pub source_name: String,
  pub sink_id: String,
  pub sink_name: String,
  pub is_static: bool,
}
