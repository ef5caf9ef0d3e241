//! Stateless password reset tokens.
//!
//! A token is an HS256 JWT carrying the user id, its expiry and the user's
//! password version at issue time. Nothing is stored server side; a token
//! stops working once it expires or the password changes.

use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::state::AppState;

/// What a verified token vouches for. The caller still has to load the user
/// and compare `password_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetGrant {
    pub user_id: Uuid,
    pub password_version: i32,
}

#[derive(Clone)]
pub struct ResetTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for ResetTokens {
    fn from_ref(state: &AppState) -> Self {
        let cfg = &state.config;
        ResetTokens::new(
            &cfg.secret_key,
            &cfg.session.issuer,
            Duration::from_secs(cfg.reset_token_ttl_seconds.max(1) as u64),
        )
    }
}

impl ResetTokens {
    pub fn new(secret: &str, issuer: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: format!("{issuer}-password-reset"),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, password_version: i32) -> anyhow::Result<String> {
        self.issue_at(user_id, password_version, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        password_version: i32,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::PasswordReset,
            pv: Some(password_version),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "reset token issued");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Option<ResetGrant> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// `None` for malformed, tampered, foreign and expired tokens alike.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Option<ResetGrant> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // Expiry is checked below against `now` with no leeway.
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding, &validation).ok()?.claims;
        if claims.kind != TokenKind::PasswordReset || now.unix_timestamp() >= claims.exp {
            return None;
        }
        Some(ResetGrant {
            user_id: claims.sub,
            password_version: claims.pv?,
        })
    }
}
