use async_trait::async_trait;

use crate::event::NotificationEvent;

/// The notification dispatch service consumed by the scheduler (§6). Out of
/// scope: how notifications actually reach a user (email, in-app, webhook).
#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn queue_notification(&self, event: NotificationEvent);
}

/// Logs every event instead of dispatching it. Used where no real
/// notification channel is configured (tests, embedding).
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
  async fn queue_notification(&self, event: NotificationEvent) {
    match event {
      NotificationEvent::AgentRun(data) => {
        tracing::info!(
          agent_name = %data.agent_name,
          graph_id = %data.graph_id,
          credits_used = data.credits_used,
          node_count = data.node_count,
          "agent run notification"
        );
      }
      NotificationEvent::LowBalance(data) => {
        tracing::warn!(
          agent_name = %data.agent_name,
          current_balance = data.current_balance,
          shortfall = data.shortfall,
          "low balance notification"
        );
      }
    }
  }
}
