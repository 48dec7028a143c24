//! Events published to the presentation layer.
//!
//! Subscribe with `NotificationCenter::subscribe()`. Delivery uses a broadcast
//! channel, so a slow subscriber lags instead of stalling the producers.

use crate::model::Notification;

/// Events emitted by the notification center.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    /// A new notification arrived over the push channel
    Notification(Notification),
    /// A pushed notification that warrants a transient alert (suppressed while the
    /// notification view is open)
    Alert(Notification),
    /// The push channel opened or closed
    ConnectionChanged { connected: bool },
    /// Automatic reconnects are used up; only a manual reconnect will retry
    ReconnectExhausted { attempts: u32 },
    /// A remote delete failed and the notification was put back
    DeleteFailed { id: String, error: String },
}
