use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::posts::repo_types::Post;

pub const MAX_PER_PAGE: i64 = 50;
const TITLE_MAX_CHARS: usize = 100;
/// Highest page whose offset still fits in an i64 at the largest page size.
const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// 1-based page number and clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub per_page: i64,
}

impl PageQuery {
    pub fn resolve(&self, default_per_page: i64) -> Result<PageParams, AppError> {
        let page = self.page.unwrap_or(1);
        if !(1..=MAX_PAGE).contains(&page) {
            return Err(AppError::NotFound("page"));
        }
        let per_page = self
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, MAX_PER_PAGE);
        Ok(PageParams { page, per_page })
    }
}

impl PageParams {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: PageParams, total: i64) -> Self {
        let pages = (total + params.per_page - 1) / params.per_page;
        Self {
            items,
            page: params.page,
            per_page: params.per_page,
            total,
            pages,
            has_prev: params.page > 1,
            has_next: params.page < pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            pages: self.pages,
            has_prev: self.has_prev,
            has_next: self.has_next,
        }
    }
}

/// Body for creating or updating a post.
#[derive(Debug, Clone, Deserialize)]
pub struct PostRequest {
    pub title: String,
    pub content: String,
}

impl PostRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(ValidationError::invalid("title", "Title is required"));
        }
        if self.title.chars().count() > TITLE_MAX_CHARS {
            return Err(ValidationError::invalid(
                "title",
                format!("Title must be at most {TITLE_MAX_CHARS} characters"),
            ));
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::invalid("content", "Content is required"));
        }
        Ok(self)
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub image_file: String,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_posted: OffsetDateTime,
    pub author: AuthorSummary,
}

impl From<Post> for PostResponse {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            title: p.title,
            content: p.content,
            date_posted: p.date_posted,
            author: AuthorSummary {
                id: p.user_id,
                username: p.author_username,
                image_file: p.author_image_file,
            },
        }
    }
}
