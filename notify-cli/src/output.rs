use crate::{cli::OutputFormat, error::Result};
#[cfg(feature = "colored-output")]
use colored::*;
use hotel_notify::{Notification, NotifyEvent};
use serde_json::json;

pub struct OutputManager {
    format: OutputFormat,
    colored: bool,
}

impl OutputManager {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    pub fn format_notifications(&self, notifications: &[Notification]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string(&json!({
                "status": "ok",
                "notifications": notifications,
            }))?),
            OutputFormat::Pretty => {
                if notifications.is_empty() {
                    return Ok(self.colorize("No notifications", &Color::Yellow, false));
                }
                let unread = notifications.iter().filter(|n| !n.read).count();
                let mut output = self.colorize(
                    &format!("{} notifications, {} unread", notifications.len(), unread),
                    &Color::Green,
                    true,
                );
                output.push('\n');
                for notification in notifications {
                    output.push_str(&self.format_notification_line(notification));
                    output.push('\n');
                }
                Ok(output)
            }
        }
    }

    pub fn format_event(&self, event: &NotifyEvent) -> Result<String> {
        if self.format == OutputFormat::Json {
            let value = match event {
                NotifyEvent::Notification(n) => json!({ "event": "notification", "notification": n }),
                NotifyEvent::Alert(n) => json!({ "event": "alert", "notification": n }),
                NotifyEvent::ConnectionChanged { connected } => {
                    json!({ "event": "connection_changed", "connected": connected })
                }
                NotifyEvent::ReconnectExhausted { attempts } => {
                    json!({ "event": "reconnect_exhausted", "attempts": attempts })
                }
                NotifyEvent::DeleteFailed { id, error } => {
                    json!({ "event": "delete_failed", "id": id, "error": error })
                }
            };
            return Ok(serde_json::to_string(&value)?);
        }

        let line = match event {
            NotifyEvent::Notification(n) => self.format_notification_line(n),
            NotifyEvent::Alert(n) => format!(
                "{} {}",
                self.colorize("ALERT", &Color::Red, true),
                self.colorize(&n.title, &Color::Yellow, true)
            ),
            NotifyEvent::ConnectionChanged { connected: true } => {
                self.colorize("● connected", &Color::Green, false)
            }
            NotifyEvent::ConnectionChanged { connected: false } => {
                self.colorize("○ disconnected", &Color::Yellow, false)
            }
            NotifyEvent::ReconnectExhausted { attempts } => self.colorize(
                &format!("Gave up reconnecting after {attempts} attempts, polling only"),
                &Color::Red,
                false,
            ),
            NotifyEvent::DeleteFailed { id, error } => self.colorize(
                &format!("Delete of {id} failed: {error}"),
                &Color::Red,
                false,
            ),
        };
        Ok(line)
    }

    /// Confirmation for a single write action.
    pub fn format_action(&self, action: &str, id: Option<&str>) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string(&json!({
                "status": "ok",
                "action": action,
                "id": id,
            }))?),
            OutputFormat::Pretty => {
                let text = match id {
                    Some(id) => format!("✓ {action} {id}"),
                    None => format!("✓ {action}"),
                };
                Ok(self.colorize(&text, &Color::Green, false))
            }
        }
    }

    fn format_notification_line(&self, n: &Notification) -> String {
        let marker = if n.read { " " } else { "*" };
        format!(
            "{} {} {:<20} {} {}  [{}]",
            self.colorize(marker, &Color::Yellow, true),
            self.colorize(&n.timestamp.format("%Y-%m-%d %H:%M").to_string(), &Color::Blue, false),
            self.colorize(n.kind.as_str(), &Color::Cyan, false),
            self.colorize(&n.title, &Color::Green, !n.read),
            n.message,
            n.id
        )
    }

    #[allow(unused_variables)]
    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                    Color::Red => text.red(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            text.to_string()
        }
    }
}

#[allow(dead_code)]
enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
    Red,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotel_notify::NotificationType;

    fn sample() -> Vec<Notification> {
        vec![
            Notification::new("2", NotificationType::BookingCancelled, "Cancelled", "Room 12"),
            Notification::new("1", NotificationType::PaymentConfirmation, "Paid", "EUR 120").with_read(true),
        ]
    }

    #[test]
    fn test_pretty_list_marks_unread() {
        let out = OutputManager::new(OutputFormat::Pretty, false);
        let text = out.format_notifications(&sample()).unwrap();
        assert!(text.starts_with("2 notifications, 1 unread"));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].starts_with('*'));
        assert!(lines[1].contains("booking_cancelled"));
        assert!(lines[2].starts_with(' '));
        assert!(lines[2].ends_with("[1]"));
    }

    #[test]
    fn test_json_list() {
        let out = OutputManager::new(OutputFormat::Json, false);
        let text = out.format_notifications(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["notifications"][0]["type"], "booking_cancelled");
    }

    #[test]
    fn test_json_events() {
        let out = OutputManager::new(OutputFormat::Json, false);
        let text = out
            .format_event(&NotifyEvent::ConnectionChanged { connected: false })
            .unwrap();
        assert_eq!(text, r#"{"connected":false,"event":"connection_changed"}"#);
    }

    #[test]
    fn test_action_confirmation() {
        let out = OutputManager::new(OutputFormat::Pretty, false);
        assert_eq!(out.format_action("Marked read", Some("7")).unwrap(), "✓ Marked read 7");
        assert_eq!(out.format_action("Marked all read", None).unwrap(), "✓ Marked all read");

        let json = OutputManager::new(OutputFormat::Json, false);
        let value: serde_json::Value =
            serde_json::from_str(&json.format_action("Deleted", Some("9")).unwrap()).unwrap();
        assert_eq!(value["action"], "Deleted");
        assert_eq!(value["id"], "9");
        assert!(value.get("affected").is_none());
    }
}
