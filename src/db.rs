use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;
use crate::error::{AppError, ValidationError};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

/// Translates the users unique constraints into validation errors. Two
/// concurrent registrations can both pass the service pre-check; the
/// constraint decides which one wins.
pub fn map_unique_violation(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some("users_username_key") => return ValidationError::DuplicateUsername.into(),
                Some("users_email_key") => return ValidationError::DuplicateEmail.into(),
                _ => {}
            }
        }
    }
    AppError::Database(err)
}
