use thiserror::Error;

/// Graph-level validation errors (§4.5 step 1, §4.6).
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("link references unknown node '{node_id}'")]
  UnknownNode { node_id: String },

  #[error("no starting nodes found for the graph")]
  NoStartingNodes,

  #[error("block for node '{node_id}' (block '{block_id}') not found")]
  BlockNotFound { node_id: String, block_id: String },
}
