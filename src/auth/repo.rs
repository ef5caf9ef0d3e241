use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, ProfileChanges, User};
use crate::db::map_unique_violation;
use crate::error::AppError;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, password_version, image_file, created_at";

/// Storage for accounts. Implementations enforce username and email
/// uniqueness atomically with the write.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError>;
    /// Stores a new hash and bumps `password_version`, but only while the
    /// version still equals `expected_version`. `None` once it has moved on.
    async fn update_password(
        &self,
        id: Uuid,
        expected_version: i32,
        password_hash: &str,
    ) -> Result<Option<User>, AppError>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_by(&self, column: &str, value: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique_violation)?;
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_by("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.find_by("username", username).await
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError> {
        let sql = format!(
            r#"
            UPDATE users
               SET username = $2, email = $3, image_file = $4
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&changes.username)
            .bind(&changes.email)
            .bind(&changes.image_file)
            .fetch_optional(&self.db)
            .await
            .map_err(map_unique_violation)?
            .ok_or(AppError::NotFound("user"))
    }

    async fn update_password(
        &self,
        id: Uuid,
        expected_version: i32,
        password_hash: &str,
    ) -> Result<Option<User>, AppError> {
        let sql = format!(
            r#"
            UPDATE users
               SET password_hash = $2, password_version = password_version + 1
             WHERE id = $1 AND password_version = $3
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .bind(expected_version)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}
