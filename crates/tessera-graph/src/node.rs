use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::link::Link;

/// An instance of a block placed in a graph with defaults and wiring (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
  pub node_id: String,
  pub block_id: String,
  /// Static configuration / defaults, merged under resolved inputs at
  /// validation time.
  pub input_default: HashMap<String, Value>,
  pub input_links: Vec<Link>,
  pub output_links: Vec<Link>,
  pub webhook_id: Option<String>,
}

impl Node {
  pub fn new(node_id: impl Into<String>, block_id: impl Into<String>) -> Self {
    Self {
      node_id: node_id.into(),
      block_id: block_id.into(),
      input_default: HashMap::new(),
      input_links: Vec::new(),
      output_links: Vec::new(),
      webhook_id: None,
    }
  }
}
