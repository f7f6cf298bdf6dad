use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Queued unconditionally at the end of every run, including `TERMINATED`
/// ones — an open design question (§9) preserved verbatim rather than
/// "fixed" without product alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunData {
  pub outputs: Value,
  pub agent_name: String,
  pub credits_used: u64,
  pub execution_time_secs: f64,
  pub graph_id: String,
  pub node_count: u32,
}

/// Queued on `InsufficientBalanceError` (§4.4, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowBalanceData {
  pub current_balance: u64,
  pub billing_page_link: String,
  /// `balance - amount`, carried as-is from
  /// [`tessera_credit::InsufficientBalanceError::shortfall`]; may be negative.
  pub shortfall: i64,
  pub agent_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
  AgentRun(AgentRunData),
  LowBalance(LowBalanceData),
}
