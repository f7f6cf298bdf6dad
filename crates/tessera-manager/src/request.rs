use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a caller supplies to start a run (§4.5 step 1). `data` carries the
/// raw values keyed by `INPUT` block name and `webhook_{id}_payload` for
/// webhook nodes; the manager projects it onto each starting node during
/// validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddExecutionRequest {
  pub graph_id: String,
  #[serde(default)]
  pub graph_version: Option<u32>,
  pub user_id: String,
  #[serde(default)]
  pub preset_id: Option<String>,
  #[serde(default)]
  pub data: HashMap<String, Value>,
}
