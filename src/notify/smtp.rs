use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use super::{Notification, NotificationGateway};
use crate::config::SmtpConfig;

/// Delivers notifications through an authenticated SMTP relay (STARTTLS).
#[derive(Clone)]
pub struct SmtpGateway {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpGateway {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        let from = cfg.from.parse::<Mailbox>().context("invalid SMTP_FROM address")?;
        Ok(Self { transport, from })
    }
}

pub(super) fn build_message(
    from: Mailbox,
    to: &str,
    notification: &Notification,
) -> anyhow::Result<Message> {
    let builder = Message::builder()
        .from(from)
        .to(to.parse::<Mailbox>().context("invalid recipient address")?)
        .subject(notification.subject());

    let message = match notification {
        Notification::PasswordReset { .. } => builder
            .header(ContentType::TEXT_PLAIN)
            .body(notification.text_body())?,
        Notification::AccountClosed { document } => {
            let content_type = ContentType::parse(&document.content_type)
                .context("invalid attachment content type")?;
            let attachment =
                Attachment::new(document.filename.clone()).body(document.bytes.clone(), content_type);
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(notification.text_body()))
                    .singlepart(attachment),
            )?
        }
    };
    Ok(message)
}

#[async_trait]
impl NotificationGateway for SmtpGateway {
    async fn send(&self, to: &str, notification: Notification) -> anyhow::Result<()> {
        let message = build_message(self.from.clone(), to, &notification)?;
        self.transport
            .send(message)
            .await
            .context("smtp send")?;
        info!(to = %to, kind = notification.kind(), "notification sent");
        Ok(())
    }
}
