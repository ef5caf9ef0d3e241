use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub remember_days: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Signs session cookies and password reset tokens. Rotating it
    /// invalidates every outstanding token.
    pub secret_key: String,
    pub public_base_url: String,
    pub reset_token_ttl_seconds: i64,
    pub posts_per_page: i64,
    pub session: SessionConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let secret_key = std::env::var("SECRET_KEY").context("SECRET_KEY is not set")?;
        if secret_key.len() < 32 {
            tracing::warn!("SECRET_KEY is shorter than 32 bytes; use a long random value");
        }

        let session = SessionConfig {
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "inkwell".into()),
            audience: std::env::var("SESSION_AUDIENCE").unwrap_or_else(|_| "inkwell-web".into()),
            ttl_minutes: env_or("SESSION_TTL_MINUTES", 60 * 24),
            remember_days: env_or("REMEMBER_DAYS", 365),
            cookie_secure: env_or("COOKIE_SECURE", false),
        };

        let mail = MailConfig {
            server: std::env::var("MAIL_SERVER").unwrap_or_else(|_| "smtp.gmail.com".into()),
            port: env_or("MAIL_PORT", 587),
            use_tls: env_or("MAIL_USE_TLS", true),
            username: std::env::var("MAIL_USERNAME").ok().filter(|v| !v.is_empty()),
            password: std::env::var("MAIL_PASSWORD").ok().filter(|v| !v.is_empty()),
            sender: std::env::var("MAIL_SENDER").unwrap_or_else(|_| "noreply@demo.com".into()),
        };

        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT is not set")?,
            bucket: std::env::var("MINIO_BUCKET").context("MINIO_BUCKET is not set")?,
            access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY is not set")?,
            secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY is not set")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };

        Ok(Self {
            database_url,
            secret_key,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into())
                .trim_end_matches('/')
                .to_string(),
            reset_token_ttl_seconds: env_or("RESET_TOKEN_TTL_SECONDS", 1800),
            posts_per_page: env_or("POSTS_PER_PAGE", 5),
            session,
            mail,
            storage,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
