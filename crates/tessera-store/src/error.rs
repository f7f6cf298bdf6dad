use tessera_credit::InsufficientBalanceError;
use thiserror::Error;

/// Errors surfaced by a `DatabaseManager` implementation (§6).
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("graph {0} not found")]
  GraphNotFound(String),
  #[error("node {0} not found")]
  NodeNotFound(String),
  #[error("graph execution {0} not found")]
  GraphExecutionNotFound(String),
  #[error("node execution {0} not found")]
  NodeExecutionNotFound(String),
  #[error(transparent)]
  InsufficientBalance(#[from] InsufficientBalanceError),
  #[error("store backend error: {0}")]
  Backend(String),
}
