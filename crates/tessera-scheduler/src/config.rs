/// Tunables for one [`crate::GraphScheduler`] (§4.3, §6).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  /// Size of the node-worker pool dispatching this run's node executions.
  pub num_node_workers: usize,
  /// `frontend_base_url`, preferred when set.
  pub frontend_base_url: Option<String>,
  /// `platform_base_url`, the fallback when no frontend URL is configured.
  pub platform_base_url: String,
}

impl SchedulerConfig {
  /// §6: billing links prefer `frontend_base_url`, falling back to
  /// `platform_base_url` when the frontend isn't configured.
  pub fn billing_base_url(&self) -> &str {
    self.frontend_base_url.as_deref().unwrap_or(&self.platform_base_url)
  }
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      num_node_workers: 4,
      frontend_base_url: None,
      platform_base_url: "https://platform.example.com".to_string(),
    }
  }
}
