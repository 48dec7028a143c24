//! Fallback polling while the push channel is down.
//!
//! The background loop idles while the channel is connected. When the channel
//! leaves `Connected` it starts a fixed-interval clock and fetches on each tick,
//! unless the notification view is open (opening the view fetches by itself). The
//! clock keeps running through reconnect attempts and is dropped once the channel
//! is connected again.
//!
//! At most one fetch is in flight. A trigger that arrives while one is outstanding
//! is dropped, not queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::api::NotificationApi;
use crate::model::ConnectionState;
use crate::store::SharedStore;
use crate::view::ViewState;

/// Result of one poll trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The fetched list (of this many entries) was applied to the store
    Applied(usize),
    /// Another fetch was already in flight
    Coalesced,
    /// The fetch failed; the store was left as is
    Failed,
}

/// Clears the in-flight flag even if the fetch future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Periodic and on-demand pull from the notification endpoint.
#[derive(Clone)]
pub struct FallbackPoller {
    api: Arc<dyn NotificationApi>,
    store: SharedStore,
    view: ViewState,
    connection: watch::Receiver<ConnectionState>,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
}

impl FallbackPoller {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        store: SharedStore,
        view: ViewState,
        connection: watch::Receiver<ConnectionState>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            store,
            view,
            connection,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Fetch now, unless a fetch is already in flight.
    pub async fn trigger(&self) -> PollOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Fetch already in flight, trigger coalesced");
            return PollOutcome::Coalesced;
        }
        let _guard = InFlight(&self.in_flight);

        let mark = self.store.begin_sync();
        match self.api.fetch_notifications().await {
            Ok(list) => {
                let count = list.len();
                self.store.reconcile(list, mark);
                debug!(count, "Applied fetched notifications");
                PollOutcome::Applied(count)
            }
            Err(e) => {
                warn!(error = %e, "Notification fetch failed, keeping current list");
                PollOutcome::Failed
            }
        }
    }

    /// Background loop; returns when `cancel` fires or the connection manager is gone.
    pub async fn run(self, cancel: CancellationToken) {
        let mut connection = self.connection.clone();
        loop {
            while *connection.borrow_and_update() == ConnectionState::Connected {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = connection.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }

            debug!(interval_secs = self.interval.as_secs(), "Push channel down, fallback polling armed");
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        if self.view.is_open() {
                            trace!("View open, skipping background poll");
                        } else {
                            // Dropping the fetch on cancel clears the in-flight flag.
                            tokio::select! {
                                _ = cancel.cancelled() => return,
                                _ = self.trigger() => {}
                            }
                        }
                    }
                    changed = connection.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if *connection.borrow_and_update() == ConnectionState::Connected {
                            debug!("Push channel back, fallback polling idle");
                            break;
                        }
                    }
                }
            }
        }
    }
}
