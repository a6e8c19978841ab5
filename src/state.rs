use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::accounts::{
    credentials::CredentialStore,
    lifecycle::AccountLifecycleManager,
    repo::{MemoryUserRepo, PgUserRepo, UserRepo},
};
use crate::auth::{jwt::JwtKeys, password::PasswordHasher, services::AuthSessionService};
use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, StorageBackend};
use crate::export::{DocumentExporter, PdfExporter};
use crate::notify::{LogGateway, NotificationGateway, SmtpGateway};
use crate::resets::{
    repo::{MemoryResetTokenRepo, PgResetTokenRepo, ResetTokenRepo},
    services::PasswordResetService,
};

/// Stores and collaborators the services are wired from.
pub struct Backends {
    pub users: Arc<dyn UserRepo>,
    pub tokens: Arc<dyn ResetTokenRepo>,
    pub gateway: Arc<dyn NotificationGateway>,
    pub exporter: Arc<dyn DocumentExporter>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct AppState {
    pub jwt: JwtKeys,
    pub credentials: CredentialStore,
    pub sessions: Arc<AuthSessionService>,
    pub resets: Arc<PasswordResetService>,
    pub accounts: Arc<AccountLifecycleManager>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, tokens): (Arc<dyn UserRepo>, Arc<dyn ResetTokenRepo>) = match &config.storage
        {
            StorageBackend::Postgres {
                database_url,
                max_connections,
            } => {
                let db = PgPoolOptions::new()
                    .max_connections(*max_connections)
                    .connect(database_url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                (
                    Arc::new(PgUserRepo::new(db.clone())),
                    Arc::new(PgResetTokenRepo::new(db)),
                )
            }
            StorageBackend::Memory => {
                warn!("using in-memory storage; data is lost on restart");
                (
                    Arc::new(MemoryUserRepo::new()),
                    Arc::new(MemoryResetTokenRepo::new()),
                )
            }
        };

        let gateway: Arc<dyn NotificationGateway> = match &config.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, "smtp notifications enabled");
                Arc::new(SmtpGateway::new(smtp)?)
            }
            None => Arc::new(LogGateway),
        };

        Self::from_parts(
            config,
            Backends {
                users,
                tokens,
                gateway,
                exporter: Arc::new(PdfExporter),
                clock: Arc::new(SystemClock),
            },
        )
    }

    pub fn from_parts(config: Arc<AppConfig>, backends: Backends) -> anyhow::Result<Self> {
        let Backends {
            users,
            tokens,
            gateway,
            exporter,
            clock,
        } = backends;

        let hasher = PasswordHasher::new(config.password_hash)?;
        let credentials = CredentialStore::new(users, hasher, clock.clone());
        let jwt = JwtKeys::from_config(&config.jwt, clock.clone());
        let issuer = Arc::new(jwt.clone());

        let sessions = Arc::new(AuthSessionService::new(credentials.clone(), issuer));
        let resets = Arc::new(PasswordResetService::new(
            credentials.clone(),
            tokens,
            gateway.clone(),
            clock,
            time::Duration::minutes(config.reset.ttl_minutes),
            config.reset.link_base.clone(),
        ));
        let accounts = Arc::new(AccountLifecycleManager::new(
            credentials.clone(),
            exporter,
            gateway,
        ));

        Ok(Self {
            jwt,
            credentials,
            sessions,
            resets,
            accounts,
        })
    }
}
