use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::link::Link;
use crate::node::Node;

/// A validated, resolved graph ready to be run (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
  pub graph_id: String,
  pub version: u32,
  pub nodes: HashMap<String, Node>,
  pub links: Vec<Link>,
  /// Nodes with no inbound data links, plus designated input/webhook nodes.
  pub starting_nodes: Vec<String>,
}

impl Graph {
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.get(node_id)
  }

  /// Links whose `source_id` is `node_id`.
  pub fn output_links_of(&self, node_id: &str) -> Vec<&Link> {
    self
      .links
      .iter()
      .filter(|l| l.source_id == node_id)
      .collect()
  }

  /// §4.5 step 1/validation: re-check graph-level invariants before running.
  /// `for_run` additionally requires at least one node be a starting node.
  pub fn validate_graph(&self, for_run: bool) -> Result<(), GraphError> {
    for link in &self.links {
      if !self.nodes.contains_key(&link.source_id) {
        return Err(GraphError::UnknownNode {
          node_id: link.source_id.clone(),
        });
      }
      if !self.nodes.contains_key(&link.sink_id) {
        return Err(GraphError::UnknownNode {
          node_id: link.sink_id.clone(),
        });
      }
    }
    if for_run && self.starting_nodes.is_empty() {
      return Err(GraphError::NoStartingNodes);
    }
    Ok(())
  }
}
