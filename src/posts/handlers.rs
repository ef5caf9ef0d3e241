use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::CurrentUser,
    error::AppError,
    posts::{
        dto::{AuthorSummary, Page, PageQuery, PostRequest, PostResponse},
        services,
    },
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/posts", get(home).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/:id/delete", post(delete_post))
        .route("/users/:username/posts", get(user_posts))
}

#[derive(Debug, Serialize)]
pub struct UserPostsResponse {
    pub user: AuthorSummary,
    pub posts: Page<PostResponse>,
}

#[instrument(skip(state))]
pub async fn home(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Page<PostResponse>>, AppError> {
    let params = q.resolve(state.config.posts_per_page)?;
    let page = services::list_posts(state.posts.as_ref(), None, params).await?;
    Ok(Json(page.map(PostResponse::from)))
}

#[instrument(skip(state))]
pub async fn user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Json<UserPostsResponse>, AppError> {
    let params = q.resolve(state.config.posts_per_page)?;
    let (user, page) =
        services::list_user_posts(state.users.as_ref(), state.posts.as_ref(), &username, params)
            .await?;
    Ok(Json(UserPostsResponse {
        user: AuthorSummary {
            id: user.id,
            username: user.username,
            image_file: user.image_file,
        },
        posts: page.map(PostResponse::from),
    }))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostResponse>, AppError> {
    let post = services::get_post(state.posts.as_ref(), id).await?;
    Ok(Json(post.into()))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PostRequest>,
) -> Result<(StatusCode, HeaderMap, Json<PostResponse>), AppError> {
    let post = services::create_post(state.posts.as_ref(), &user, payload).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/posts/{}", post.id).parse() {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(post.into())))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let post = services::update_post(state.posts.as_ref(), &user, id, payload).await?;
    Ok(Json(post.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_post(state.posts.as_ref(), &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
