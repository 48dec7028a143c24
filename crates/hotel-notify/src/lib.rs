//! hotel-notify: real-time notification delivery for the hotel-operations dashboard.
//!
//! Notifications reach the dashboard over a persistent push channel. While the
//! channel is down, a fallback poller pulls the list from the REST API on a fixed
//! interval. Both paths write into one deduplicated, newest-first store.
//!
//! ## Core Types
//!
//! - [`Notification`] - A single notification with its read flag
//! - [`NotificationStore`] / [`SharedStore`] - Ordered, deduplicated list with read state
//! - [`ConnectionState`] - `Disconnected`, `Connecting` or `Connected`
//! - [`NotifyEvent`] - Events published to the presentation layer
//!
//! ## Push Channel
//!
//! - [`ConnectionManager`] - Connect, disconnect and automatic reconnect
//! - [`ReconnectPolicy`] - Capped exponential backoff
//! - [`EventDispatcher`] - Parses inbound frames and merges notifications
//! - [`PushTransport`] / [`WebSocketTransport`] - Channel seam and its websocket implementation
//!
//! ## Fallback
//!
//! - [`FallbackPoller`] - Interval and on-demand fetches while the channel is down
//! - [`NotificationApi`] / [`HttpNotificationApi`] - REST collaborator
//!
//! ## Wiring
//!
//! - [`NotificationCenter`] - Owns all of the above for one session
//! - [`NotifyConfig`] - Serde-loadable configuration

pub mod api;
pub mod center;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod model;
pub mod poller;
pub mod reconnect;
pub mod store;
pub mod transport;
pub mod view;

#[cfg(test)]
mod test_support;

pub use api::{HttpNotificationApi, NotificationApi};
pub use center::NotificationCenter;
pub use config::{DeleteFailurePolicy, NotifyConfig, ReconnectConfig};
pub use connection::{ConnectionHandlers, ConnectionManager};
pub use dispatcher::{Dispatch, EventDispatcher};
pub use error::{NotifyError, Result};
pub use events::NotifyEvent;
pub use model::{ConnectionState, Notification, NotificationData, NotificationType};
pub use poller::{FallbackPoller, PollOutcome};
pub use reconnect::ReconnectPolicy;
pub use store::{NotificationStore, SharedStore, StoreSummary, SyncMark};
pub use transport::{FrameStream, PushTransport, WebSocketTransport, install_rustls_provider};
pub use view::ViewState;
