//! Push channel transport.
//!
//! [`PushTransport`] opens the channel and [`FrameStream`] yields its text frames.
//! The connection manager only depends on these traits, so the lifecycle logic is
//! the same whether frames come from a websocket or a test double.

use std::sync::OnceLock;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tracing::{debug, warn};
use url::Url;

use crate::error::{NotifyError, Result};

/// Install the process-wide rustls crypto provider once.
///
/// Both reqwest (built without a provider) and tungstenite's rustls connector rely
/// on it.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Opens the persistent push channel.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    async fn open(&self, url: &Url) -> Result<Box<dyn FrameStream>>;
}

/// An open push channel.
#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame. `None` means the channel closed cleanly; `Some(Err(_))` means
    /// it broke.
    async fn next_frame(&mut self) -> Option<Result<String>>;

    /// Close the channel from our side.
    async fn close(&mut self);
}

/// Websocket transport built on tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        install_rustls_provider();
        Self
    }
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    async fn open(&self, url: &Url) -> Result<Box<dyn FrameStream>> {
        // The query string carries the session token; keep it out of logs.
        let host = url.host_str().unwrap_or_default().to_string();
        debug!(host = %host, path = %url.path(), "Opening websocket");

        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| NotifyError::connection(format!("websocket open to {host} failed: {e}")))?;

        debug!(status = %response.status(), "Websocket handshake complete");
        Ok(Box::new(WebSocketFrames { inner: stream }))
    }
}

struct WebSocketFrames {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameStream for WebSocketFrames {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => warn!(len = bytes.len(), "Dropping non UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Server closed websocket");
                    return None;
                }
                // Pings are answered by tungstenite.
                Ok(_) => {}
                Err(e) => return Some(Err(NotifyError::connection(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            debug!(error = %e, "Error while closing websocket");
        }
    }
}
