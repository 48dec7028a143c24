//! Composition root for one dashboard session.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{HttpNotificationApi, NotificationApi};
use crate::config::{DeleteFailurePolicy, NotifyConfig};
use crate::connection::{ConnectionHandlers, ConnectionManager};
use crate::dispatcher::EventDispatcher;
use crate::error::Result;
use crate::events::NotifyEvent;
use crate::model::{ConnectionState, Notification};
use crate::poller::{FallbackPoller, PollOutcome};
use crate::store::{SharedStore, StoreSummary};
use crate::transport::{PushTransport, WebSocketTransport};
use crate::view::ViewState;

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the store, the push channel and the fallback poller of a session, and exposes
/// the operations the presentation layer needs.
///
/// Presentation code consumes changes through [`NotificationCenter::subscribe`] and
/// [`NotificationCenter::watch_store`].
pub struct NotificationCenter {
    config: NotifyConfig,
    store: SharedStore,
    view: ViewState,
    api: Arc<dyn NotificationApi>,
    manager: ConnectionManager,
    poller: FallbackPoller,
    events: broadcast::Sender<NotifyEvent>,
    poll_task: Mutex<Option<PollTask>>,
}

impl NotificationCenter {
    pub fn new(
        config: NotifyConfig,
        transport: Arc<dyn PushTransport>,
        api: Arc<dyn NotificationApi>,
    ) -> Result<Self> {
        config.validate()?;

        let store = SharedStore::new();
        let view = ViewState::new();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let dispatcher = Arc::new(EventDispatcher::new(
            store.clone(),
            view.clone(),
            config.alert_types.clone(),
            events.clone(),
        ));
        let manager = ConnectionManager::new(config.clone(), transport, dispatcher, events.clone());
        let poller = FallbackPoller::new(
            Arc::clone(&api),
            store.clone(),
            view.clone(),
            manager.subscribe_state(),
            config.poll_interval(),
        );

        Ok(Self {
            config,
            store,
            view,
            api,
            manager,
            poller,
            events,
            poll_task: Mutex::new(None),
        })
    }

    /// Websocket push channel plus the HTTP REST client.
    pub fn with_websocket(config: NotifyConfig) -> Result<Self> {
        let api = Arc::new(HttpNotificationApi::new(config.clone())?);
        Self::new(config, Arc::new(WebSocketTransport::new()), api)
    }

    /// Authenticate, open the push channel and arm the fallback poller.
    pub fn start(&self, token: impl Into<String>) {
        let token = token.into();
        self.api.set_token(Some(token.clone()));

        let on_notification = self.events.clone();
        let on_change = self.events.clone();
        let handlers = ConnectionHandlers::new()
            .on_notification(move |n| {
                let _ = on_notification.send(NotifyEvent::Notification(n));
            })
            .on_connection_change(move |connected| {
                let _ = on_change.send(NotifyEvent::ConnectionChanged { connected });
            });
        self.manager.connect(token, handlers);

        let mut task = self.poll_task.lock();
        if task.is_none() {
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(self.poller.clone().run(cancel.clone()));
            *task = Some(PollTask { cancel, handle });
            debug!("Fallback poller started");
        }
    }

    /// Close the push channel and stop background polling.
    pub fn stop(&self) {
        self.manager.disconnect();
        if let Some(task) = self.poll_task.lock().take() {
            task.cancel.cancel();
            task.handle.abort();
        }
        info!("Notification center stopped");
    }

    /// Manual reconnect after the automatic attempts ran out.
    pub fn reconnect(&self) -> Result<()> {
        self.manager.reconnect()
    }

    /// Mark the view open and fetch right away.
    pub async fn open_view(&self) -> PollOutcome {
        self.view.set_open(true);
        self.poller.trigger().await
    }

    pub fn close_view(&self) {
        self.view.set_open(false);
    }

    pub fn is_view_open(&self) -> bool {
        self.view.is_open()
    }

    pub async fn refresh(&self) -> PollOutcome {
        self.poller.trigger().await
    }

    /// Flip the local flag and tell the server in the background.
    ///
    /// Returns whether the local flag changed. A failed remote call is only logged;
    /// the next fetch keeps the local read flag anyway.
    pub fn mark_read(&self, id: &str) -> bool {
        let changed = self.store.update(|s| s.mark_read(id));
        let api = Arc::clone(&self.api);
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.mark_read(&id).await {
                warn!(id = %id, error = %e, "Remote mark-read failed");
            }
        });
        changed
    }

    /// Mark everything read on the server, then locally. Returns the number of entries
    /// flipped locally.
    pub async fn mark_all_read(&self) -> Result<usize> {
        if let Err(e) = self.api.mark_all_read().await {
            warn!(error = %e, "Remote mark-all-read failed, local state unchanged");
            return Err(e);
        }
        Ok(self.store.update(|s| s.mark_all_read()))
    }

    /// Remove locally, then on the server.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.store.update(|s| s.remove(id));
        let Err(e) = self.api.delete(id).await else {
            return Ok(());
        };
        warn!(id = %id, error = %e, policy = ?self.config.delete_failure, "Remote delete failed");

        if let Some(notification) = removed {
            match self.config.delete_failure {
                DeleteFailurePolicy::KeepRemoved => {
                    self.store.update(|s| s.clear_tombstone(id));
                }
                DeleteFailurePolicy::Restore => {
                    self.store.update(|s| s.restore(notification));
                    let _ = self.events.send(NotifyEvent::DeleteFailed {
                        id: id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Err(e)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.store.snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.store.unread_count()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.manager.subscribe_state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotifyEvent> {
        self.events.subscribe()
    }

    pub fn watch_store(&self) -> watch::Receiver<StoreSummary> {
        self.store.watch()
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.lock().take() {
            task.cancel.cancel();
        }
    }
}
