use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{extractors::CurrentUser, repo_types::User, services as auth_services},
    error::{AppError, ValidationError},
    images::services::{discard_profile_picture, picture_url, save_profile_picture, UploadItem},
    state::AppState,
};

const PICTURE_LIMIT_BYTES: usize = 5 * 1024 * 1024;

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/account",
            get(get_account).put(update_account).post(update_account_multipart),
        )
        .layer(DefaultBodyLimit::max(PICTURE_LIMIT_BYTES))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub image_file: String,
    pub image_url: Option<String>,
}

async fn account_response(state: &AppState, user: User) -> AccountResponse {
    let image_url = match picture_url(state.storage.as_ref(), &user.image_file).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "profile picture url unavailable");
            None
        }
    };
    AccountResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        image_file: user.image_file,
        image_url,
    }
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<AccountResponse> {
    Json(account_response(&state, user).await)
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let updated = auth_services::update_profile(
        state.users.as_ref(),
        &user,
        &payload.username,
        &payload.email,
        None,
    )
    .await?;
    Ok(Json(account_response(&state, updated).await))
}

/// Form-style update: `username`, `email` and an optional `picture` file.
/// Missing text fields keep their current values.
#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn update_account_multipart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> Result<Json<AccountResponse>, AppError> {
    let mut username = user.username.clone();
    let mut email = user.email.clone();
    let mut picture = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ValidationError::invalid("form", e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("username") => {
                username = field
                    .text()
                    .await
                    .map_err(|e| ValidationError::invalid("username", e.body_text()))?;
            }
            Some("email") => {
                email = field
                    .text()
                    .await
                    .map_err(|e| ValidationError::invalid("email", e.body_text()))?;
            }
            Some("picture") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| ValidationError::invalid("picture", e.body_text()))?;
                // Browsers send an empty part when no file was chosen.
                if !body.is_empty() {
                    picture = Some((filename, content_type, body));
                }
            }
            _ => {}
        }
    }

    // Validate the text fields before anything is uploaded.
    auth_services::normalize_username(&username)?;
    auth_services::normalize_email(&email)?;

    let new_image = match picture {
        Some((filename, content_type, body)) => Some(
            save_profile_picture(
                state.storage.as_ref(),
                UploadItem {
                    filename: filename.as_deref(),
                    content_type: content_type.as_deref(),
                    body,
                },
            )
            .await?,
        ),
        None => None,
    };

    let result = auth_services::update_profile(
        state.users.as_ref(),
        &user,
        &username,
        &email,
        new_image.clone(),
    )
    .await;

    match (result, new_image) {
        (Ok(updated), Some(_)) => {
            discard_profile_picture(state.storage.as_ref(), &user.image_file).await;
            Ok(Json(account_response(&state, updated).await))
        }
        (Ok(updated), None) => Ok(Json(account_response(&state, updated).await)),
        (Err(e), Some(orphan)) => {
            discard_profile_picture(state.storage.as_ref(), &orphan).await;
            Err(e)
        }
        (Err(e), None) => Err(e),
    }
}
