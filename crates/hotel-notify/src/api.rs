//! REST collaborator for notifications.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::NotifyConfig;
use crate::error::{NotifyError, Result};
use crate::model::Notification;
use crate::transport::install_rustls_provider;

/// Remote notification endpoints. All calls are bearer-authenticated.
#[async_trait]
pub trait NotificationApi: Send + Sync + 'static {
    /// `GET /notifications`
    async fn fetch_notifications(&self) -> Result<Vec<Notification>>;

    /// `PUT /notifications/{id}/read`
    async fn mark_read(&self, id: &str) -> Result<()>;

    /// `PUT /notifications/read-all`
    async fn mark_all_read(&self) -> Result<()>;

    /// `DELETE /notifications/{id}`
    async fn delete(&self, id: &str) -> Result<()>;

    /// Swap the bearer token used for subsequent calls.
    fn set_token(&self, _token: Option<String>) {}
}

/// Rows are kept as raw JSON so one unknown kind does not fail the whole list.
#[derive(Debug, Deserialize)]
struct NotificationList {
    #[serde(default)]
    notifications: Vec<serde_json::Value>,
}

impl NotificationList {
    fn into_notifications(self) -> Vec<Notification> {
        self.notifications
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Notification>(row) {
                Ok(notification) => Some(notification),
                Err(e) => {
                    warn!(error = %e, "Skipping notification row that does not match the model");
                    None
                }
            })
            .collect()
    }
}

/// `NotificationApi` over HTTP with reqwest.
pub struct HttpNotificationApi {
    client: Client,
    config: NotifyConfig,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpNotificationApi {
    pub fn new(config: NotifyConfig) -> Result<Self> {
        install_rustls_provider();
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Use an existing client (shared connection pool, custom proxy).
    pub fn with_client(client: Client, config: NotifyConfig) -> Self {
        Self {
            client,
            config,
            token: Arc::new(RwLock::new(None)),
        }
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let token = self
            .token
            .read()
            .clone()
            .ok_or(NotifyError::NotConfigured("bearer token"))?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send(&self, method: Method, segments: &[&str]) -> Result<Response> {
        let url = self.config.api_url(segments)?;
        debug!(method = %method, path = %url.path(), "Notification API request");
        let response = self.request(method, url)?.send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };
    Err(NotifyError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        let response = self.send(Method::GET, &["notifications"]).await?;
        let body = response.text().await?;
        let list: NotificationList = serde_json::from_str(&body)?;
        Ok(list.into_notifications())
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.send(Method::PUT, &["notifications", id, "read"])
            .await
            .map(|_| ())
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.send(Method::PUT, &["notifications", "read-all"])
            .await
            .map(|_| ())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send(Method::DELETE, &["notifications", id])
            .await
            .map(|_| ())
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}
