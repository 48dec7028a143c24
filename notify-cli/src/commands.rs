use hotel_notify::{
    HttpNotificationApi, Notification, NotificationApi, NotificationCenter, NotificationStore,
    NotifyEvent, PollOutcome,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{config::AppConfig, error::Result, output::OutputManager};

pub struct CommandExecutor {
    config: AppConfig,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, output: OutputManager) -> Self {
        Self { config, output }
    }

    fn api(&self) -> Result<HttpNotificationApi> {
        let token = self.config.require_token()?;
        let api = HttpNotificationApi::new(self.config.notify.clone())?;
        api.set_token(Some(token.to_string()));
        Ok(api)
    }

    pub async fn list(&self, unread_only: bool) -> Result<()> {
        let fetched = self.api()?.fetch_notifications().await?;
        debug!(count = fetched.len(), "Fetched notifications");

        let mut store = NotificationStore::new();
        store.replace_all(fetched);
        let notifications: Vec<_> = store
            .iter()
            .filter(|n| !unread_only || !n.read)
            .cloned()
            .collect();

        println!("{}", self.output.format_notifications(&notifications)?);
        Ok(())
    }

    pub async fn read(&self, id: &str) -> Result<()> {
        self.api()?.mark_read(id).await?;
        println!("{}", self.output.format_action("Marked read", Some(id))?);
        Ok(())
    }

    pub async fn read_all(&self) -> Result<()> {
        self.api()?.mark_all_read().await?;
        println!("{}", self.output.format_action("Marked all read", None)?);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.api()?.delete(id).await?;
        println!("{}", self.output.format_action("Deleted", Some(id))?);
        Ok(())
    }

    /// Follow the push channel until Ctrl-C.
    pub async fn watch(&self) -> Result<()> {
        let token = self.config.require_token()?.to_string();
        let center = NotificationCenter::with_websocket(self.config.notify.clone())?;
        let mut events = center.subscribe();

        info!(base_url = %self.config.notify.base_url, "Watching notifications");
        center.start(token);

        if let PollOutcome::Applied(_) = center.refresh().await {
            println!("{}", self.output.format_notifications(&center.notifications())?);
        }

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Interrupted, shutting down");
                    break;
                }
                event = events.recv() => match event {
                    // Printed once, as the alert.
                    Ok(NotifyEvent::Notification(n)) if self.is_alert(&n) => {}
                    Ok(event) => println!("{}", self.output.format_event(&event)?),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        center.stop();
        Ok(())
    }

    fn is_alert(&self, notification: &Notification) -> bool {
        self.config.notify.alert_types.contains(&notification.kind)
    }

    pub fn show_config(&self) -> Result<()> {
        println!("{}", self.config.show()?);
        Ok(())
    }
}
