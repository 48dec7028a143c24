//! Inbound frame dispatch.
//!
//! Frames on the push channel are JSON objects of the form
//! `{"type": "notification", "payload": {...}}`. Anything that does not parse, or
//! carries an unknown `type`, is logged and dropped. A bad frame never closes the
//! channel.

use std::collections::HashSet;

use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::events::NotifyEvent;
use crate::model::{Notification, NotificationType};
use crate::store::SharedStore;
use crate::view::ViewState;

const NOTIFICATION_FRAME: &str = "notification";

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Outcome of dispatching one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A new notification was merged into the store
    Merged(Notification),
    /// The notification id was already known
    Duplicate(String),
    /// Well-formed frame with a `type` we do not handle
    Ignored(String),
    /// Not JSON, or a notification payload that does not match the model
    Malformed,
}

/// Parses push frames and routes notification payloads into the store.
pub struct EventDispatcher {
    store: SharedStore,
    view: ViewState,
    alert_types: HashSet<NotificationType>,
    events: broadcast::Sender<NotifyEvent>,
}

impl EventDispatcher {
    pub fn new(
        store: SharedStore,
        view: ViewState,
        alert_types: impl IntoIterator<Item = NotificationType>,
        events: broadcast::Sender<NotifyEvent>,
    ) -> Self {
        Self {
            store,
            view,
            alert_types: alert_types.into_iter().collect(),
            events,
        }
    }

    pub fn dispatch(&self, frame: &str) -> Dispatch {
        trace!(len = frame.len(), "Dispatching frame");

        let raw: RawFrame = match serde_json::from_str(frame) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return Dispatch::Malformed;
            }
        };

        if raw.kind != NOTIFICATION_FRAME {
            debug!(frame_type = %raw.kind, "Ignoring unrecognized frame");
            return Dispatch::Ignored(raw.kind);
        }

        let notification: Notification = match serde_json::from_value(raw.payload) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Dropping notification frame with invalid payload");
                return Dispatch::Malformed;
            }
        };

        if !self.store.merge(notification.clone()) {
            debug!(id = %notification.id, "Duplicate notification ignored");
            return Dispatch::Duplicate(notification.id);
        }

        if self.alert_types.contains(&notification.kind) && !self.view.is_open() {
            // No subscribers is fine.
            let _ = self.events.send(NotifyEvent::Alert(notification.clone()));
        }

        Dispatch::Merged(notification)
    }
}
