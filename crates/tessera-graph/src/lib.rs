//! Graph, node, link and block data model for the tessera execution engine.
//!
//! This crate is pure data plus validation logic (§3, §4.6 of the engine
//! spec): it owns no I/O and talks to no external system. The scheduler,
//! resolver and executor crates build on top of these types.

mod block;
mod error;
mod execution;
mod graph;
mod json;
mod link;
mod node;
mod status;

pub use block::{
  Aggregate, Block, BlockCatalog, BlockError, BlockInput, BlockOutputStream, BlockSchema,
  BlockType, CredentialFieldSpec, ExecutionContext, FieldSpec, ValueType,
};
pub use error::GraphError;
pub use execution::{
  GraphExecution, GraphExecutionEntry, GraphExecutionStats, NodeExecution, NodeExecutionEntry,
  NodeExecutionStats,
};
pub use graph::Graph;
pub use json::canonical_json;
pub use link::Link;
pub use node::Node;
pub use status::ExecutionStatus;
