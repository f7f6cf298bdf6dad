//! Credit and usage metering for the tessera execution engine (§4.4).
//!
//! Two independent charges are debited before a node is dispatched: a
//! per-block cost (conditionally, via [`CostModel`]) and a per-execution
//! tiered cost ([`execution_usage_cost`]). Both go through the same
//! `DatabaseManager::spend_credits` seam in `tessera-store`, which raises
//! [`InsufficientBalanceError`] when a debit would take the balance negative.

mod cost;
mod error;
mod metadata;

pub use cost::{execution_usage_cost, CostModel, FixedBlockCost, NoopCostModel};
pub use error::InsufficientBalanceError;
pub use metadata::UsageTransactionMetadata;
