use serde_json::Value;
use tessera_graph::{Block, BlockInput};

/// Pluggable per-block and per-execution cost lookup (§4.4). The engine ships
/// a `NoopCostModel` for tests and embedders that don't meter usage; real
/// deployments supply their own, typically backed by a pricing table keyed on
/// block id and a filter over the input.
pub trait CostModel: Send + Sync {
  /// §4.4 step 1: cost charged once per node execution, before dispatch.
  /// Returns the cost in credits and, if the match was conditional on part of
  /// the input, the matching filter to attach to the usage-transaction
  /// metadata.
  fn block_usage_cost(&self, block: &dyn Block, input_data: &BlockInput) -> (u64, Option<Value>);
}

/// Charges nothing. Used where usage metering is out of scope (embedding,
/// tests).
pub struct NoopCostModel;

impl CostModel for NoopCostModel {
  fn block_usage_cost(&self, _block: &dyn Block, _input_data: &BlockInput) -> (u64, Option<Value>) {
    (0, None)
  }
}

/// §4.4 step 1 alternative: a flat per-block-id price table, for deployments
/// that don't need input-conditional pricing.
pub struct FixedBlockCost {
  prices: std::collections::HashMap<String, u64>,
}

impl FixedBlockCost {
  pub fn new(prices: std::collections::HashMap<String, u64>) -> Self {
    Self { prices }
  }
}

impl CostModel for FixedBlockCost {
  fn block_usage_cost(&self, block: &dyn Block, _input_data: &BlockInput) -> (u64, Option<Value>) {
    (self.prices.get(block.id()).copied().unwrap_or(0), None)
  }
}

/// §4.4 step 2: the per-execution tiered cost curve. `counter` is the
/// 1-indexed count of node executions charged so far in the run (including
/// this one); the curve is monotonic non-decreasing in `counter` so a long
/// run never gets cheaper per-step as it goes. Returns the cost for this
/// step and the counter to carry into the next call.
///
/// The tiers themselves are implementer-defined (§4.4 note); this engine
/// gives the first 10 node executions of a run for free, then charges 1
/// credit per step up to 50, then 2 credits per step beyond that.
pub fn execution_usage_cost(counter: u64) -> (u64, u64) {
  let cost = if counter <= 10 {
    0
  } else if counter <= 50 {
    1
  } else {
    2
  };
  (cost, counter)
}
