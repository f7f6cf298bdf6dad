/// Tunables for one [`crate::ExecutionManager`] (§4.5, §6).
#[derive(Debug, Clone)]
pub struct ExecutionManagerConfig {
  /// Size of the graph-worker pool: how many graph runs execute concurrently.
  pub num_graph_workers: usize,
  /// Forwarded to every [`tessera_scheduler::GraphScheduler`] this manager
  /// spawns — the node-worker pool size within one run.
  pub num_node_workers: usize,
  /// `frontend_base_url`, preferred for billing links when set (§6).
  pub frontend_base_url: Option<String>,
  /// `platform_base_url`, the fallback base URL for billing links (§6).
  pub platform_base_url: String,
}

impl Default for ExecutionManagerConfig {
  fn default() -> Self {
    Self {
      num_graph_workers: 4,
      num_node_workers: 4,
      frontend_base_url: None,
      platform_base_url: "https://platform.example.com".to_string(),
    }
  }
}
