use std::{fmt, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    /// Prefix for the link mailed with a reset token, e.g. `https://app/reset`.
    pub link_base: Option<String>,
}

/// argon2id cost parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String, max_connections: u32 },
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub jwt: JwtConfig,
    pub reset: ResetConfig,
    pub password_hash: Argon2Params,
    pub smtp: Option<SmtpConfig>,
}

/// Parse an optional numeric variable into `T`, rejecting values that do not
/// fit the type as well as zero and negatives.
fn positive<T>(key: &str, raw: Option<String>) -> anyhow::Result<Option<T>>
where
    T: FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid {key} `{raw}`: {e}"))?;
    if value <= T::default() {
        anyhow::bail!("{key} must be greater than zero, got `{raw}`");
    }
    Ok(Some(value))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| var(key).filter(|v| !v.is_empty());

        let storage = match var("STORAGE_BACKEND").as_deref().unwrap_or("postgres") {
            "memory" => StorageBackend::Memory,
            "postgres" => StorageBackend::Postgres {
                database_url: var("DATABASE_URL").context("DATABASE_URL is not set")?,
                max_connections: positive("DATABASE_MAX_CONNECTIONS", parsed("DATABASE_MAX_CONNECTIONS"))?
                    .unwrap_or(10),
            },
            other => anyhow::bail!("unknown STORAGE_BACKEND `{other}`"),
        };

        let jwt = JwtConfig {
            secret: var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "accountd".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "accountd-users".into()),
            ttl_minutes: positive("JWT_TTL_MINUTES", parsed("JWT_TTL_MINUTES"))?.unwrap_or(60),
        };

        let reset = ResetConfig {
            ttl_minutes: positive(
                "RESET_TOKEN_TTL_MINUTES",
                parsed("RESET_TOKEN_TTL_MINUTES"),
            )?
            .unwrap_or(120),
            link_base: var("RESET_LINK_BASE").filter(|v| !v.is_empty()),
        };

        let defaults = Argon2Params::default();
        let password_hash = Argon2Params {
            memory_kib: positive("PASSWORD_HASH_MEMORY_KIB", parsed("PASSWORD_HASH_MEMORY_KIB"))?
                .unwrap_or(defaults.memory_kib),
            iterations: positive("PASSWORD_HASH_ITERATIONS", parsed("PASSWORD_HASH_ITERATIONS"))?
                .unwrap_or(defaults.iterations),
            parallelism: positive(
                "PASSWORD_HASH_PARALLELISM",
                parsed("PASSWORD_HASH_PARALLELISM"),
            )?
            .unwrap_or(defaults.parallelism),
        };

        let smtp = match var("SMTP_HOST").filter(|v| !v.is_empty()) {
            Some(host) => Some(SmtpConfig {
                port: positive("SMTP_PORT", parsed("SMTP_PORT"))?.unwrap_or(587),
                username: var("SMTP_USERNAME").context("SMTP_USERNAME is not set")?,
                password: var("SMTP_PASSWORD").context("SMTP_PASSWORD is not set")?,
                from: var("SMTP_FROM").context("SMTP_FROM is not set")?,
                host,
            }),
            None => None,
        };

        Ok(Self {
            storage,
            jwt,
            reset,
            password_hash,
            smtp,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            storage: StorageBackend::Memory,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            reset: ResetConfig {
                ttl_minutes: 120,
                link_base: Some("https://accounts.test/reset".into()),
            },
            password_hash: Argon2Params {
                memory_kib: argon2::Params::MIN_M_COST,
                iterations: 1,
                parallelism: 1,
            },
            smtp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_for_memory_backend() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .expect("config");

        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert_eq!(cfg.jwt.issuer, "accountd");
        assert_eq!(cfg.jwt.ttl_minutes, 60);
        assert_eq!(cfg.reset.ttl_minutes, 120);
        assert!(cfg.reset.link_base.is_none());
        assert!(cfg.smtp.is_none());
        assert_eq!(cfg.password_hash.memory_kib, argon2::Params::DEFAULT_M_COST);
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn smtp_section_is_read_when_host_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/accounts"),
            ("JWT_SECRET", "s3cret"),
            ("RESET_TOKEN_TTL_MINUTES", "30"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_PASSWORD", "pw"),
            ("SMTP_FROM", "Accounts <no-reply@example.com>"),
        ]))
        .expect("config");

        assert_eq!(
            cfg.storage,
            StorageBackend::Postgres {
                database_url: "postgres://localhost/accounts".into(),
                max_connections: 10,
            }
        );
        assert_eq!(cfg.reset.ttl_minutes, 30);
        let smtp = cfg.smtp.expect("smtp");
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 587);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "sqlite"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        let base = [
            ("DATABASE_URL", "postgres://localhost/accounts"),
            ("JWT_SECRET", "s3cret"),
        ];
        for (key, value) in [
            ("DATABASE_MAX_CONNECTIONS", "-1"),
            ("RESET_TOKEN_TTL_MINUTES", "-5"),
            ("RESET_TOKEN_TTL_MINUTES", "0"),
            ("JWT_TTL_MINUTES", "sixty"),
            ("PASSWORD_HASH_MEMORY_KIB", "4294967296"),
        ] {
            let mut pairs = base.to_vec();
            pairs.push((key, value));
            let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(err.to_string().contains(key), "{key}={value}: {err}");
        }

        let err = AppConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("JWT_SECRET", "s3cret"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "70000"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_PASSWORD", "pw"),
            ("SMTP_FROM", "no-reply@example.com"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SMTP_PORT"));
    }
}
