use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::posts::repo_types::{NewPost, Post};

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn insert(&self, post: NewPost) -> Result<Post, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, AppError>;
    /// Only title and content are mutable; the owner never changes.
    async fn update(&self, id: Uuid, title: &str, content: &str) -> Result<Post, AppError>;
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
    /// Newest first. `author` narrows the listing to one user.
    async fn list_recent(
        &self,
        author: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError>;
    async fn count(&self, author: Option<Uuid>) -> Result<i64, AppError>;
}

#[derive(Clone)]
pub struct PgPostRepo {
    db: PgPool,
}

impl PgPostRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostRepo for PgPostRepo {
    async fn insert(&self, post: NewPost) -> Result<Post, AppError> {
        let row = sqlx::query_as::<_, Post>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (id, user_id, title, content, date_posted)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, user_id, title, content, date_posted
            )
            SELECT i.id, i.user_id, i.title, i.content, i.date_posted,
                   u.username AS author_username, u.image_file AS author_image_file
              FROM inserted i
              JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, AppError> {
        let row = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.user_id, p.title, p.content, p.date_posted,
                   u.username AS author_username, u.image_file AS author_image_file
              FROM posts p
              JOIN users u ON u.id = p.user_id
             WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, title: &str, content: &str) -> Result<Post, AppError> {
        sqlx::query_as::<_, Post>(
            r#"
            WITH updated AS (
                UPDATE posts SET title = $2, content = $3
                 WHERE id = $1
                RETURNING id, user_id, title, content, date_posted
            )
            SELECT p.id, p.user_id, p.title, p.content, p.date_posted,
                   u.username AS author_username, u.image_file AS author_image_file
              FROM updated p
              JOIN users u ON u.id = p.user_id
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("post"))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("post"));
        }
        Ok(())
    }

    async fn list_recent(
        &self,
        author: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.user_id, p.title, p.content, p.date_posted,
                   u.username AS author_username, u.image_file AS author_image_file
              FROM posts p
              JOIN users u ON u.id = p.user_id
             WHERE ($1::uuid IS NULL OR p.user_id = $1)
             ORDER BY p.date_posted DESC, p.id DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(author)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count(&self, author: Option<Uuid>) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts WHERE ($1::uuid IS NULL OR user_id = $1)",
        )
        .bind(author)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }
}
