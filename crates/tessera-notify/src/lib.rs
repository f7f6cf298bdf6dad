//! The notification-sink consumed interface (§6) plus a logging default
//! implementation.

mod event;
mod sink;

pub use event::{AgentRunData, LowBalanceData, NotificationEvent};
pub use sink::{LoggingNotificationSink, NotificationSink};
