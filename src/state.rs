use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::mail::{self, Mailer};
use crate::posts::repo::{PgPostRepo, PostRepo};
use crate::storage::{S3Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let storage = Arc::new(S3Storage::connect(&config.storage).await?) as Arc<dyn StorageClient>;
        let mailer: Arc<dyn Mailer> = Arc::from(mail::from_config(&config.mail)?);

        Ok(Self::from_parts(
            Arc::new(config),
            Arc::new(PgUserRepo::new(db.clone())),
            Arc::new(PgPostRepo::new(db)),
            storage,
            mailer,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        posts: Arc<dyn PostRepo>,
        storage: Arc<dyn StorageClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            users,
            posts,
            storage,
            mailer,
        }
    }
}
