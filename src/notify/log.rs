use async_trait::async_trait;
use tracing::{debug, info};

use super::{Notification, NotificationGateway};

/// Gateway used when no SMTP relay is configured: logs instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn send(&self, to: &str, notification: Notification) -> anyhow::Result<()> {
        info!(to = %to, kind = notification.kind(), "notification not delivered: SMTP is not configured");
        if let Notification::PasswordReset { link, .. } = &notification {
            debug!(to = %to, link = ?link, "password reset link");
        }
        Ok(())
    }
}
