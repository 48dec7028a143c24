//! Push channel lifecycle.
//!
//! [`ConnectionManager`] owns the single push channel of a session. It moves
//! through `Disconnected -> Connecting -> Connected` and back, and schedules
//! reconnects with [`ReconnectPolicy`] until the attempts run out.
//!
//! Every open attempt gets an epoch number and a [`CancellationToken`]. The
//! reconnect timer that follows a failed attempt shares that token. `disconnect()`
//! sets the intentional-close flag, cancels the token and bumps the epoch under the
//! same lock. A timer or close event that is already running when that happens
//! sees the new epoch and backs off.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::NotifyConfig;
use crate::dispatcher::{Dispatch, EventDispatcher};
use crate::error::{NotifyError, Result};
use crate::events::NotifyEvent;
use crate::model::{ConnectionState, Notification};
use crate::reconnect::ReconnectPolicy;
use crate::transport::PushTransport;

pub type NotificationHandler = Arc<dyn Fn(Notification) + Send + Sync>;
pub type ConnectionChangeHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Callbacks registered by `connect()`. A later `connect()` replaces them all.
#[derive(Clone, Default)]
pub struct ConnectionHandlers {
    pub on_notification: Option<NotificationHandler>,
    pub on_connection_change: Option<ConnectionChangeHandler>,
}

impl ConnectionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_notification(mut self, f: impl Fn(Notification) + Send + Sync + 'static) -> Self {
        self.on_notification = Some(Arc::new(f));
        self
    }

    pub fn on_connection_change(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_connection_change = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ConnectionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandlers")
            .field("on_notification", &self.on_notification.is_some())
            .field("on_connection_change", &self.on_connection_change.is_some())
            .finish()
    }
}

struct Inner {
    state: ConnectionState,
    /// Consecutive failed or closed sessions since the last successful open.
    attempt: u32,
    exhausted: bool,
    token: Option<String>,
    handlers: ConnectionHandlers,
    intentional_close: bool,
    epoch: u64,
    /// Cancels the current session task and its reconnect timer.
    cancel: Option<CancellationToken>,
}

struct Shared {
    config: NotifyConfig,
    policy: ReconnectPolicy,
    transport: Arc<dyn PushTransport>,
    dispatcher: Arc<EventDispatcher>,
    events: broadcast::Sender<NotifyEvent>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Owns the push channel: connect, disconnect and automatic reconnect.
///
/// Dropping the manager tears the channel down.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        config: NotifyConfig,
        transport: Arc<dyn PushTransport>,
        dispatcher: Arc<EventDispatcher>,
        events: broadcast::Sender<NotifyEvent>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let policy = ReconnectPolicy::from(config.reconnect);
        Self {
            shared: Arc::new(Shared {
                config,
                policy,
                transport,
                dispatcher,
                events,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    attempt: 0,
                    exhausted: false,
                    token: None,
                    handlers: ConnectionHandlers::default(),
                    intentional_close: false,
                    epoch: 0,
                    cancel: None,
                }),
                state_tx,
            }),
        }
    }

    /// Open the channel with `token`.
    ///
    /// `handlers` always replace the previous ones. The channel itself is left alone
    /// if it is already connecting or connected.
    pub fn connect(&self, token: impl Into<String>, handlers: ConnectionHandlers) {
        let mut inner = self.shared.inner.lock();
        inner.handlers = handlers;
        if inner.state.is_active() {
            debug!(state = %inner.state, "connect() ignored, channel already active");
            return;
        }
        inner.token = Some(token.into());
        inner.intentional_close = false;
        inner.attempt = 0;
        inner.exhausted = false;
        Shared::start_attempt(&self.shared, &mut inner);
    }

    /// Close the channel and stop reconnecting until the next `connect()`.
    pub fn disconnect(&self) {
        let callback = {
            let mut inner = self.shared.inner.lock();
            inner.intentional_close = true;
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
            inner.epoch += 1;
            inner.attempt = 0;
            inner.exhausted = false;
            let previous = inner.state;
            self.shared.set_state(&mut inner, ConnectionState::Disconnected);
            if previous == ConnectionState::Disconnected {
                None
            } else {
                info!("Push channel disconnected");
                inner.handlers.on_connection_change.clone()
            }
        };
        if let Some(callback) = callback {
            callback(false);
        }
    }

    /// Manual reconnect: resets the attempt counter and retries immediately.
    pub fn reconnect(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.token.is_none() {
            return Err(NotifyError::NotConfigured("session token"));
        }
        if inner.state.is_active() {
            debug!(state = %inner.state, "reconnect() ignored, channel already active");
            return Ok(());
        }
        info!("Manual reconnect requested");
        inner.intentional_close = false;
        inner.attempt = 0;
        inner.exhausted = false;
        Shared::start_attempt(&self.shared, &mut inner);
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.inner.lock().attempt
    }

    /// True once automatic reconnects are used up.
    pub fn is_exhausted(&self) -> bool {
        self.shared.inner.lock().exhausted
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        inner.intentional_close = true;
        inner.epoch += 1;
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Shared {
    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    /// Begin a new open attempt under a fresh epoch.
    fn start_attempt(this: &Arc<Self>, inner: &mut Inner) {
        let Some(token) = inner.token.clone() else {
            warn!("No session token, not opening push channel");
            return;
        };
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        inner.epoch += 1;
        let epoch = inner.epoch;
        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        this.set_state(inner, ConnectionState::Connecting);

        let shared = Arc::clone(this);
        tokio::spawn(async move {
            shared.run_session(epoch, token, cancel).await;
        });
    }

    async fn run_session(self: Arc<Self>, epoch: u64, token: String, cancel: CancellationToken) {
        let url = match self.config.websocket_url(&token) {
            Ok(url) => url,
            Err(e) => {
                self.on_closed(epoch, &e);
                return;
            }
        };

        let timeout = self.config.connect_timeout();
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            result = tokio::time::timeout(timeout, self.transport.open(&url)) => result,
        };

        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.on_closed(epoch, &e);
                return;
            }
            Err(_) => {
                self.on_closed(epoch, &NotifyError::Timeout(timeout));
                return;
            }
        };

        if !self.on_open(epoch) {
            stream.close().await;
            return;
        }

        let error = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    stream.close().await;
                    return;
                }
                frame = stream.next_frame() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => break e,
                    None => break NotifyError::connection("channel closed by server"),
                },
            }
        };

        self.on_closed(epoch, &error);
    }

    fn handle_frame(&self, text: &str) {
        if let Dispatch::Merged(notification) = self.dispatcher.dispatch(text) {
            let callback = self.inner.lock().handlers.on_notification.clone();
            if let Some(callback) = callback {
                callback(notification);
            }
        }
    }

    /// Returns false if the attempt was superseded while opening.
    fn on_open(&self, epoch: u64) -> bool {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || inner.intentional_close {
                debug!(epoch, "Discarding channel opened by a superseded attempt");
                return false;
            }
            inner.attempt = 0;
            inner.exhausted = false;
            self.set_state(&mut inner, ConnectionState::Connected);
            inner.handlers.on_connection_change.clone()
        };
        info!("Push channel connected");
        if let Some(callback) = callback {
            callback(true);
        }
        true
    }

    fn on_closed(self: &Arc<Self>, epoch: u64, error: &NotifyError) {
        let (callback, exhausted) = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || inner.intentional_close {
                debug!(epoch, "Ignoring close from a superseded attempt");
                return;
            }
            let previous = inner.state;
            self.set_state(&mut inner, ConnectionState::Disconnected);

            if previous == ConnectionState::Connected {
                warn!(error = %error, "Push channel lost");
            } else {
                warn!(error = %error, attempt = inner.attempt + 1, "Push channel failed to open");
            }

            inner.attempt += 1;
            let exhausted = if self.policy.should_retry(inner.attempt) {
                let delay = self.policy.delay(inner.attempt - 1);
                let cancel = inner.cancel.get_or_insert_with(CancellationToken::new).clone();
                self.schedule_reconnect(epoch, delay, cancel);
                debug!(
                    attempt = inner.attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnect scheduled"
                );
                None
            } else {
                inner.exhausted = true;
                Some(inner.attempt)
            };
            (inner.handlers.on_connection_change.clone(), exhausted)
        };

        if let Some(callback) = callback {
            callback(false);
        }
        if let Some(attempts) = exhausted {
            error!(attempts, "Reconnect attempts exhausted, waiting for manual reconnect");
            let _ = self.events.send(NotifyEvent::ReconnectExhausted { attempts });
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, epoch: u64, delay: Duration, cancel: CancellationToken) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            shared.fire_reconnect(epoch);
        });
    }

    fn fire_reconnect(self: &Arc<Self>, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.intentional_close
            || inner.epoch != epoch
            || inner.state != ConnectionState::Disconnected
        {
            debug!(epoch, "Reconnect timer aborted");
            return;
        }
        info!(attempt = inner.attempt, "Reconnecting push channel");
        Shared::start_attempt(self, &mut inner);
    }
}
