use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            ensure_passwords_match, safe_next, AuthResponse, LoginRequest, MessageResponse,
            NextQuery, PublicUser, RegisterRequest, ResetPasswordRequest, ResetRequest,
        },
        extractors::MaybeUser,
        reset::ResetTokens,
        services,
        session::SessionKeys,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", get(logout).post(logout))
        .route("/auth/reset_password", post(reset_request))
        .route(
            "/auth/reset_password/:token",
            get(reset_token_check).post(reset_token_submit),
        )
}

/// Logged-in callers have no business on the anonymous-only pages.
fn home_if_logged_in(current: &MaybeUser) -> Option<Response> {
    current.0.as_ref().map(|_| Redirect::to("/").into_response())
}

#[instrument(skip(state, current, payload))]
pub async fn register(
    State(state): State<AppState>,
    current: MaybeUser,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    if let Some(redirect) = home_if_logged_in(&current) {
        return Ok(redirect);
    }
    ensure_passwords_match(&payload.password, &payload.confirm_password)?;

    let user = services::create_user(
        state.users.as_ref(),
        &payload.username,
        &payload.email,
        &payload.password,
    )
    .await?;

    let body = AuthResponse {
        token: None,
        user: PublicUser::from(user),
        redirect_to: Some("/auth/login".into()),
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub async fn login_page(Query(q): Query<NextQuery>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Please log in to access this page.",
        "next": safe_next(q.next.as_deref()),
    }))
}

#[instrument(skip(state, current, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    current: MaybeUser,
    jar: CookieJar,
    Query(q): Query<NextQuery>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if let Some(redirect) = home_if_logged_in(&current) {
        return Ok(redirect);
    }

    let user = services::verify_credentials(state.users.as_ref(), &payload.email, &payload.password)
        .await?
        .ok_or(AppError::AuthenticationFailed)?;

    let keys = SessionKeys::from_ref(&state);
    let token = keys.sign(user.id, payload.remember)?;
    let jar = jar.add(keys.cookie(token.clone(), payload.remember));

    info!(user_id = %user.id, remember = payload.remember, "user logged in");
    let body = AuthResponse {
        token: Some(token),
        user: PublicUser::from(user),
        redirect_to: Some(safe_next(q.next.as_deref()).unwrap_or_else(|| "/".into())),
    };
    Ok((jar, Json(body)).into_response())
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (jar.remove(SessionKeys::removal_cookie()), Redirect::to("/"))
}

#[instrument(skip(state, current, payload))]
pub async fn reset_request(
    State(state): State<AppState>,
    current: MaybeUser,
    Json(payload): Json<ResetRequest>,
) -> Result<Response, AppError> {
    if let Some(redirect) = home_if_logged_in(&current) {
        return Ok(redirect);
    }
    services::request_password_reset(
        state.users.as_ref(),
        &ResetTokens::from_ref(&state),
        state.mailer.as_ref(),
        &state.config,
        &payload.email,
    )
    .await?;

    let body = MessageResponse::new(
        "If that email belongs to an account, a reset link has been sent to it.",
    );
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

#[instrument(skip_all)]
pub async fn reset_token_check(
    State(state): State<AppState>,
    current: MaybeUser,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    if let Some(redirect) = home_if_logged_in(&current) {
        return Ok(redirect);
    }
    services::user_for_reset_token(state.users.as_ref(), &ResetTokens::from_ref(&state), &token)
        .await?;
    Ok(Json(MessageResponse::new("Token is valid. Choose a new password.")).into_response())
}

#[instrument(skip_all)]
pub async fn reset_token_submit(
    State(state): State<AppState>,
    current: MaybeUser,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    if let Some(redirect) = home_if_logged_in(&current) {
        return Ok(redirect);
    }
    services::reset_password(
        state.users.as_ref(),
        &ResetTokens::from_ref(&state),
        &token,
        &payload.password,
        &payload.confirm_password,
    )
    .await?;
    Ok(Json(MessageResponse::new("Your password has been reset! Please log in.")).into_response())
}
