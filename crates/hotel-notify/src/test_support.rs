//! Shared test doubles for the push transport and the REST collaborator.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use crate::api::NotificationApi;
use crate::error::{NotifyError, Result};
use crate::model::{Notification, NotificationType};
use crate::transport::{FrameStream, PushTransport};

pub(crate) fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::minutes(minute)
}

pub(crate) fn notif(id: &str, minute: i64) -> Notification {
    Notification::new(id, NotificationType::SystemMessage, "title", "message")
        .with_timestamp(at(minute))
}

pub(crate) fn notification_frame(id: &str, kind: &str, minute: i64) -> String {
    serde_json::json!({
        "type": "notification",
        "payload": {
            "id": id,
            "type": kind,
            "title": "t",
            "message": "m",
            "timestamp": at(minute),
        }
    })
    .to_string()
}

/// Let spawned tasks run without advancing the (paused) clock.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// How the scripted transport answers one `open` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenStep {
    Accept,
    Fail,
    Hang,
}

pub(crate) enum ServerFrame {
    Text(String),
    Error,
    Close,
}

/// Transport whose `open` results follow a script, falling back to `Fail`.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<OpenStep>>,
    fallback: OpenStep,
    opens: AtomicUsize,
    open_times: Mutex<Vec<Instant>>,
    urls: Mutex<Vec<Url>>,
    servers: Mutex<Vec<mpsc::UnboundedSender<ServerFrame>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: impl IntoIterator<Item = OpenStep>) -> Arc<Self> {
        Self::with_fallback(script, OpenStep::Fail)
    }

    pub(crate) fn with_fallback(
        script: impl IntoIterator<Item = OpenStep>,
        fallback: OpenStep,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            opens: AtomicUsize::new(0),
            open_times: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
            servers: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Gaps between consecutive `open` calls.
    pub(crate) fn open_gaps(&self) -> Vec<Duration> {
        let times = self.open_times.lock();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub(crate) fn last_url(&self) -> Option<Url> {
        self.urls.lock().last().cloned()
    }

    /// Send a frame on the `index`-th accepted connection.
    pub(crate) fn send(&self, index: usize, frame: ServerFrame) {
        if let Some(tx) = self.servers.lock().get(index) {
            let _ = tx.send(frame);
        }
    }

    pub(crate) fn push_text(&self, index: usize, text: String) {
        self.send(index, ServerFrame::Text(text));
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn open(&self, url: &Url) -> Result<Box<dyn FrameStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_times.lock().push(Instant::now());
        self.urls.lock().push(url.clone());
        let step = self.script.lock().pop_front().unwrap_or(self.fallback);
        match step {
            OpenStep::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.servers.lock().push(tx);
                Ok(Box::new(ScriptedStream { rx }))
            }
            OpenStep::Fail => Err(NotifyError::connection("connection refused")),
            OpenStep::Hang => futures::future::pending().await,
        }
    }
}

struct ScriptedStream {
    rx: mpsc::UnboundedReceiver<ServerFrame>,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        match self.rx.recv().await {
            Some(ServerFrame::Text(text)) => Some(Ok(text)),
            Some(ServerFrame::Error) => Some(Err(NotifyError::connection("connection reset"))),
            Some(ServerFrame::Close) | None => None,
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// In-memory REST collaborator with failure switches and call counters.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub(crate) server: Mutex<Vec<Notification>>,
    pub(crate) fail_fetch: Mutex<bool>,
    pub(crate) fail_writes: Mutex<bool>,
    /// Artificial latency for `fetch_notifications`.
    pub(crate) fetch_delay: Mutex<Option<Duration>>,
    pub(crate) fetches: AtomicUsize,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn new(server: Vec<Notification>) -> Arc<Self> {
        Arc::new(Self {
            server: Mutex::new(server),
            ..Default::default()
        })
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn write_result(&self, call: String) -> Result<()> {
        self.calls.lock().push(call);
        if *self.fail_writes.lock() {
            return Err(NotifyError::Api {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_fetch.lock() {
            return Err(NotifyError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self.server.lock().clone())
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.write_result(format!("read:{id}"))
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.write_result("read-all".to_string())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.write_result(format!("delete:{id}"))
    }
}
