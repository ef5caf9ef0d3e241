use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A post joined with the author columns listings display.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid, // owner, fixed at creation
    pub title: String,
    pub content: String,
    pub date_posted: OffsetDateTime,
    pub author_username: String,
    pub author_image_file: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
}
