use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;

/// A rendered notification ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// `Ok(Delivery::Skipped)` when delivery is not configured.
    async fn send(&self, notification: &Notification) -> anyhow::Result<Delivery>;
}

pub struct SmtpNotifier {
    config: EmailConfig,
}

impl SmtpNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn credentials(&self) -> Option<(&str, &str, &str)> {
        let sender = self.config.sender.as_deref()?;
        let password = self.config.password.as_deref()?;
        let recipient = self.config.recipient.as_deref()?;
        Some((sender, password, recipient))
    }
}

pub fn build_message(
    sender: &str,
    recipient: &str,
    notification: &Notification,
) -> anyhow::Result<Message> {
    let mut body = MultiPart::mixed().singlepart(SinglePart::html(notification.html_body.clone()));

    if let Some(path) = notification.attachment.as_deref().filter(|path| path.exists()) {
        body = body.singlepart(attachment_part(path)?);
    }

    Message::builder()
        .from(sender.parse().context("invalid sender address")?)
        .to(recipient.parse().context("invalid recipient address")?)
        .subject(notification.subject.clone())
        .multipart(body)
        .context("failed to build email")
}

fn attachment_part(path: &Path) -> anyhow::Result<SinglePart> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let is_html = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
    let content_type = if is_html {
        ContentType::TEXT_HTML
    } else {
        ContentType::parse("application/octet-stream")?
    };
    Ok(Attachment::new(file_name).body(bytes, content_type))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<Delivery> {
        let Some((sender, password, recipient)) = self.credentials() else {
            return Ok(Delivery::Skipped);
        };

        let message = build_message(sender, recipient, notification)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .context("failed to configure SMTP relay")?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();

        transport
            .send(message)
            .await
            .with_context(|| format!("failed to send email via {}", self.config.smtp_host))?;
        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records notifications instead of sending them.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<Notification>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> anyhow::Result<Delivery> {
            if self.fail {
                anyhow::bail!("transport down");
            }
            self.sent
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push(notification.clone());
            Ok(Delivery::Sent)
        }
    }

    fn notification(attachment: Option<PathBuf>) -> Notification {
        Notification {
            subject: "LeetCode Daily Report — 15 January 2024".to_string(),
            html_body: "<p>hello</p>".to_string(),
            attachment,
        }
    }

    #[tokio::test]
    async fn missing_credentials_skip_delivery() {
        let notifier = SmtpNotifier::new(EmailConfig {
            sender: Some("tracker@example.com".to_string()),
            ..EmailConfig::default()
        });
        let delivery = notifier.send(&notification(None)).await.unwrap();
        assert_eq!(delivery, Delivery::Skipped);
    }

    #[test]
    fn message_carries_attachment_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        std::fs::write(&path, "<table></table>").unwrap();

        let message = build_message(
            "tracker@example.com",
            "mentor@example.com",
            &notification(Some(path)),
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("report.html"));
        assert!(raw.contains("text/html"));
        assert!(!raw.contains("application/octet-stream"));
    }

    #[test]
    fn absent_attachment_is_left_out() {
        let message = build_message(
            "tracker@example.com",
            "mentor@example.com",
            &notification(Some(PathBuf::from("/nonexistent/report.html"))),
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(!raw.contains("attachment"));
    }

    #[test]
    fn bad_address_is_rejected() {
        assert!(build_message("not an address", "mentor@example.com", &notification(None)).is_err());
    }
}
