use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use super::repo_types::User;
use super::session::{SessionKeys, SESSION_COOKIE};
use crate::error::AppError;
use crate::state::AppState;

/// Outcome of resolving the caller's identity, before any handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Authenticated(User),
    Unauthenticated,
}

/// Sends an anonymous caller to the login page, remembering where they
/// were going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectToLogin {
    pub next: String,
}

impl RedirectToLogin {
    pub fn location(&self) -> String {
        format!("/auth/login?next={}", urlencoding::encode(&self.next))
    }
}

impl IntoResponse for RedirectToLogin {
    fn into_response(self) -> Response {
        Redirect::to(&self.location()).into_response()
    }
}

impl AuthState {
    pub fn current_user(self) -> Option<User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn require_authenticated(self, next: &str) -> Result<User, RedirectToLogin> {
        self.current_user().ok_or_else(|| RedirectToLogin {
            next: next.to_string(),
        })
    }
}

/// Session cookie first, then `Authorization: Bearer`.
fn session_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::to_string)
}

pub async fn resolve(parts: &Parts, state: &AppState) -> Result<AuthState, AppError> {
    let Some(token) = session_token(parts) else {
        return Ok(AuthState::Unauthenticated);
    };
    let keys = SessionKeys::from_ref(state);
    let Some(user_id) = keys.verify(&token) else {
        debug!("invalid or expired session token");
        return Ok(AuthState::Unauthenticated);
    };
    match state.users.find_by_id(user_id).await? {
        Some(user) => Ok(AuthState::Authenticated(user)),
        None => {
            debug!(%user_id, "session for unknown user");
            Ok(AuthState::Unauthenticated)
        }
    }
}

/// Guard for protected routes; anonymous callers are redirected to login.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let next = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".into());
        let auth = resolve(parts, state).await.map_err(IntoResponse::into_response)?;
        auth.require_authenticated(&next)
            .map(CurrentUser)
            .map_err(IntoResponse::into_response)
    }
}

/// Identity for routes that behave differently when logged in.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?.current_user()))
    }
}
