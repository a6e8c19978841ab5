//! Outbound notifications. The core decides *what* to send; gateways
//! decide how it travels.

use async_trait::async_trait;

use crate::export::Document;

mod log;
mod smtp;

pub use log::LogGateway;
pub use smtp::SmtpGateway;

/// A notification; the variant is the template kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    PasswordReset {
        token: String,
        link: Option<String>,
    },
    AccountClosed {
        document: Document,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PasswordReset { .. } => "password_reset",
            Self::AccountClosed { .. } => "account_closed",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::PasswordReset { .. } => "Password Reset",
            Self::AccountClosed { .. } => "Account Deleted",
        }
    }

    pub fn text_body(&self) -> String {
        match self {
            Self::PasswordReset { token, link } => {
                let mut body = String::from(
                    "Password Reset\n\nWe received a request to reset your password.\n\n",
                );
                match link {
                    Some(link) => body.push_str(&format!("Open this link to continue:\n{link}\n\n")),
                    None => body.push_str(&format!("Your reset token:\n{token}\n\n")),
                }
                body.push_str("The token expires after two hours and works once.\n");
                body
            }
            Self::AccountClosed { .. } => "Your account has been deleted.\n\n\
                 A copy of your account data is attached.\n"
                .to_string(),
        }
    }
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, to: &str, notification: Notification) -> anyhow::Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use async_trait::async_trait;

    use super::{Notification, NotificationGateway};

    /// Records every delivery; can be switched to fail.
    #[derive(Default)]
    pub struct RecordingGateway {
        sent: Mutex<Vec<(String, Notification)>>,
        failing: AtomicBool,
    }

    impl RecordingGateway {
        pub fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<(String, Notification)> {
            self.sent.lock().expect("gateway lock").clone()
        }

        /// Token of the most recent password-reset notification.
        pub fn last_reset_token(&self) -> Option<String> {
            self.sent().into_iter().rev().find_map(|(_, n)| match n {
                Notification::PasswordReset { token, .. } => Some(token),
                _ => None,
            })
        }
    }

    #[async_trait]
    impl NotificationGateway for RecordingGateway {
        async fn send(&self, to: &str, notification: Notification) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("mailer unavailable");
            }
            self.sent
                .lock()
                .expect("gateway lock")
                .push((to.to_string(), notification));
            Ok(())
        }
    }
}
