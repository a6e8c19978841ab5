use std::sync::Arc;

use tracing::{error, info};

use crate::accounts::credentials::CredentialStore;
use crate::accounts::repo_types::User;
use crate::errors::AuthError;
use crate::export::DocumentExporter;
use crate::notify::{Notification, NotificationGateway};

/// Deactivation workflow: status change first, then export and mail.
/// Failures after the status change are reported but never undo it.
pub struct AccountLifecycleManager {
    credentials: CredentialStore,
    exporter: Arc<dyn DocumentExporter>,
    gateway: Arc<dyn NotificationGateway>,
}

impl AccountLifecycleManager {
    pub fn new(
        credentials: CredentialStore,
        exporter: Arc<dyn DocumentExporter>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            credentials,
            exporter,
            gateway,
        }
    }

    pub async fn deactivate(&self, user: &User) -> Result<User, AuthError> {
        let user = self.credentials.deactivate(user).await?;

        let document = self.exporter.export(&user).map_err(|e| {
            error!(user_id = %user.id, error = %e, "account export failed");
            AuthError::ExportFailed(e)
        })?;

        self.gateway
            .send(&user.email, Notification::AccountClosed { document })
            .await
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "account closure mail failed");
                AuthError::NotificationFailed(e)
            })?;

        info!(user_id = %user.id, "account closed");
        Ok(user)
    }
}
