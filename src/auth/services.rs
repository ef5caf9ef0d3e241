use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::dto::ensure_passwords_match;
use crate::auth::password::{burn_verification, hash_password_blocking, verify_password_blocking};
use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{NewUser, ProfileChanges, User};
use crate::auth::reset::ResetTokens;
use crate::config::AppConfig;
use crate::error::{AppError, ValidationError};
use crate::mail::{MailMessage, Mailer};

const USERNAME_MIN_CHARS: usize = 2;
const USERNAME_MAX_CHARS: usize = 20;
const EMAIL_MAX_CHARS: usize = 120;
const PASSWORD_MIN_CHARS: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) || email.chars().count() > EMAIL_MAX_CHARS {
        return Err(ValidationError::invalid("email", "Invalid email"));
    }
    Ok(email)
}

pub fn normalize_username(raw: &str) -> Result<String, ValidationError> {
    let username = raw.trim().to_string();
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(ValidationError::invalid(
            "username",
            format!("Username must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"),
        ));
    }
    Ok(username)
}

pub fn check_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::invalid(
            "password",
            format!("Password must be at least {PASSWORD_MIN_CHARS} characters"),
        ));
    }
    Ok(())
}

/// Registers an account. Uniqueness is checked before the (slow) hash; the
/// repository's unique constraints settle any race after that.
pub async fn create_user(
    users: &dyn UserRepo,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let username = normalize_username(username)?;
    let email = normalize_email(email)?;
    check_password(password)?;

    if users.find_by_username(&username).await?.is_some() {
        warn!(%username, "username already registered");
        return Err(ValidationError::DuplicateUsername.into());
    }
    if users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ValidationError::DuplicateEmail.into());
    }

    let password_hash = hash_password_blocking(password.to_string()).await?;
    let user = users
        .insert(NewUser {
            username,
            email,
            password_hash,
        })
        .await?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// `None` for an unknown email and for a wrong password alike.
pub async fn verify_credentials(
    users: &dyn UserRepo,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let email = email.trim().to_lowercase();
    let Some(user) = users.find_by_email(&email).await? else {
        burn_verification(password.to_string()).await;
        warn!(%email, "login unknown email");
        return Ok(None);
    };

    if verify_password_blocking(password.to_string(), user.password_hash.clone()).await? {
        Ok(Some(user))
    } else {
        warn!(user_id = %user.id, "login invalid password");
        Ok(None)
    }
}

/// Replaces username, email and optionally the picture. The user's own
/// current values never count as collisions.
pub async fn update_profile(
    users: &dyn UserRepo,
    acting: &User,
    username: &str,
    email: &str,
    image_file: Option<String>,
) -> Result<User, AppError> {
    let username = normalize_username(username)?;
    let email = normalize_email(email)?;

    if username != acting.username && users.find_by_username(&username).await?.is_some() {
        return Err(ValidationError::DuplicateUsername.into());
    }
    if email != acting.email && users.find_by_email(&email).await?.is_some() {
        return Err(ValidationError::DuplicateEmail.into());
    }

    let user = users
        .update_profile(
            acting.id,
            ProfileChanges {
                username,
                email,
                image_file: image_file.unwrap_or_else(|| acting.image_file.clone()),
            },
        )
        .await?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

pub fn reset_email(cfg: &AppConfig, user: &User, token: &str) -> MailMessage {
    let link = format!("{}/auth/reset_password/{}", cfg.public_base_url, token);
    MailMessage {
        subject: "Password Reset Request".into(),
        from: cfg.mail.sender.clone(),
        to: user.email.clone(),
        body: format!(
            "To reset the password, click the following link:\n{link}\n\
             If you did not make this request then simply ignore this.\n"
        ),
    }
}

/// Emails a reset link when the address belongs to an account. The
/// outcome is the same either way, and a failed send is only logged.
pub async fn request_password_reset(
    users: &dyn UserRepo,
    tokens: &ResetTokens,
    mailer: &dyn Mailer,
    cfg: &AppConfig,
    email: &str,
) -> Result<(), AppError> {
    let email = normalize_email(email)?;
    let Some(user) = users.find_by_email(&email).await? else {
        info!(%email, "password reset requested for unknown email");
        return Ok(());
    };

    let token = tokens.issue(user.id, user.password_version)?;
    if let Err(e) = mailer.send(reset_email(cfg, &user, &token)).await {
        warn!(error = %e, user_id = %user.id, "reset email not sent");
    } else {
        info!(user_id = %user.id, "reset email sent");
    }
    Ok(())
}

/// Accepts a token only if it verifies, its user still exists and the
/// password has not changed since it was issued.
pub async fn user_for_reset_token(
    users: &dyn UserRepo,
    tokens: &ResetTokens,
    token: &str,
) -> Result<User, AppError> {
    let Some(grant) = tokens.verify(token) else {
        warn!("invalid or expired reset token");
        return Err(AppError::TokenInvalid);
    };
    match users.find_by_id(grant.user_id).await? {
        Some(user) if user.password_version == grant.password_version => Ok(user),
        _ => {
            warn!(user_id = %grant.user_id, "reset token no longer matches an account");
            Err(AppError::TokenInvalid)
        }
    }
}

/// Token first, then the new password. The write only lands if the
/// password version is still the one the token was issued for, so a token
/// is consumed at most once even under concurrent submissions.
pub async fn reset_password(
    users: &dyn UserRepo,
    tokens: &ResetTokens,
    token: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<User, AppError> {
    let user = user_for_reset_token(users, tokens, token).await?;
    ensure_passwords_match(new_password, confirm_password)?;
    check_password(new_password)?;

    let hash = hash_password_blocking(new_password.to_string()).await?;
    let Some(user) = users
        .update_password(user.id, user.password_version, &hash)
        .await?
    else {
        warn!(user_id = %user.id, "reset token already consumed");
        return Err(AppError::TokenInvalid);
    };
    info!(user_id = %user.id, "password reset");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{test_config, MemoryStore, RecordingMailer};

    fn tokens() -> ResetTokens {
        ResetTokens::new("service-secret", "inkwell", Duration::from_secs(1800))
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user example.com"));
        assert_eq!(normalize_email("  Bob@Example.COM ").unwrap(), "bob@example.com");
    }

    #[test]
    fn username_and_password_rules() {
        assert!(normalize_username("a").is_err());
        assert!(normalize_username("ab").is_ok());
        assert!(normalize_username(&"x".repeat(21)).is_err());
        assert!(check_password("short").is_err());
        assert!(check_password("long enough").is_ok());
    }

    #[tokio::test]
    async fn create_user_stores_a_hash_not_the_password() {
        let store = MemoryStore::default();
        let user = create_user(&store, "alice", "alice@example.com", "wonderland1")
            .await
            .unwrap();
        assert_eq!(user.image_file, "default.jpg");

        let found = store.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_ne!(found.password_hash, "wonderland1");
    }

    #[tokio::test]
    async fn duplicate_email_fails_regardless_of_username() {
        let store = MemoryStore::default();
        create_user(&store, "alice", "alice@example.com", "wonderland1").await.unwrap();

        let err = create_user(&store, "alice2", "ALICE@example.com", "another-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::DuplicateEmail)));

        let err = create_user(&store, "alice", "other@example.com", "another-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::DuplicateUsername)));
    }

    #[tokio::test]
    async fn malformed_registration_is_rejected_before_storage() {
        let store = MemoryStore::default();
        let err = create_user(&store, "alice", "not-an-email", "wonderland1").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::Invalid { field: "email", .. })));
        assert!(store.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verify_credentials_checks_password() {
        let store = MemoryStore::default();
        let user = create_user(&store, "alice", "alice@example.com", "wonderland1")
            .await
            .unwrap();

        let ok = verify_credentials(&store, "alice@example.com", "wonderland1").await.unwrap();
        assert_eq!(ok.map(|u| u.id), Some(user.id));
        assert!(verify_credentials(&store, "alice@example.com", "wrong-pass")
            .await
            .unwrap()
            .is_none());
        assert!(verify_credentials(&store, "nobody@example.com", "wonderland1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_profile_exempts_own_values() {
        let store = MemoryStore::default();
        let alice = create_user(&store, "alice", "alice@example.com", "wonderland1").await.unwrap();
        create_user(&store, "bob", "bob@example.com", "builder123").await.unwrap();

        let same = update_profile(&store, &alice, "alice", "alice@example.com", None)
            .await
            .unwrap();
        assert_eq!(same.username, "alice");

        let renamed = update_profile(&store, &alice, "alicia", "alice@example.com", Some("ab12.png".into()))
            .await
            .unwrap();
        assert_eq!(renamed.username, "alicia");
        assert_eq!(renamed.image_file, "ab12.png");

        let err = update_profile(&store, &renamed, "bob", "alice@example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::DuplicateUsername)));
        let err = update_profile(&store, &renamed, "alicia", "bob@example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::DuplicateEmail)));

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.username, "alicia");
        assert_eq!(stored.email, "alice@example.com");
    }

    #[tokio::test]
    async fn reset_flow_changes_password_once() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        let cfg = test_config();
        let tokens = tokens();
        create_user(&store, "alice", "alice@example.com", "old-password").await.unwrap();

        request_password_reset(&store, &tokens, &mailer, &cfg, "alice@example.com")
            .await
            .unwrap();
        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert_eq!(sent[0].subject, "Password Reset Request");
        let token = RecordingMailer::reset_token(&sent[0]).expect("link in body");

        reset_password(&store, &tokens, &token, "new-password", "new-password").await.unwrap();

        assert!(verify_credentials(&store, "alice@example.com", "new-password")
            .await
            .unwrap()
            .is_some());
        assert!(verify_credentials(&store, "alice@example.com", "old-password")
            .await
            .unwrap()
            .is_none());

        let err = reset_password(&store, &tokens, &token, "third-password", "third-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[tokio::test]
    async fn reset_request_for_unknown_email_sends_nothing() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        request_password_reset(&store, &tokens(), &mailer, &test_config(), "ghost@example.com")
            .await
            .unwrap();
        assert!(mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn token_for_missing_user_is_invalid() {
        let store = MemoryStore::default();
        let token = tokens().issue(uuid::Uuid::new_v4(), 0).unwrap();
        let err = user_for_reset_token(&store, &tokens(), &token).await.unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[tokio::test]
    async fn weak_new_password_keeps_token_usable() {
        let store = MemoryStore::default();
        let alice = create_user(&store, "alice", "alice@example.com", "old-password").await.unwrap();
        let token = tokens().issue(alice.id, alice.password_version).unwrap();

        let err = reset_password(&store, &tokens(), &token, "short", "short").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(user_for_reset_token(&store, &tokens(), &token).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_resets_consume_the_token_once() {
        let store = std::sync::Arc::new(MemoryStore::default());
        let alice = create_user(store.as_ref(), "alice", "alice@example.com", "old-password")
            .await
            .unwrap();
        let token = tokens().issue(alice.id, alice.password_version).unwrap();

        let (tokens_a, tokens_b) = (tokens(), tokens());
        let (first, second) = tokio::join!(
            reset_password(store.as_ref(), &tokens_a, &token, "first-password", "first-password"),
            reset_password(store.as_ref(), &tokens_b, &token, "second-password", "second-password"),
        );

        let outcomes = [&first, &second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::TokenInvalid))));

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.password_version, 1);
        let winner = if first.is_ok() { "first-password" } else { "second-password" };
        assert!(verify_credentials(store.as_ref(), "alice@example.com", winner)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn stale_version_write_is_refused() {
        let store = MemoryStore::default();
        let alice = create_user(&store, "alice", "alice@example.com", "old-password").await.unwrap();

        let updated = store.update_password(alice.id, 0, "hash-one").await.unwrap();
        assert_eq!(updated.map(|u| u.password_version), Some(1));
        assert!(store.update_password(alice.id, 0, "hash-two").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_token_wins_over_mismatched_passwords() {
        let store = MemoryStore::default();
        let err = reset_password(&store, &tokens(), "garbage", "one-password", "other-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[tokio::test]
    async fn mismatched_passwords_with_good_token_keep_it_usable() {
        let store = MemoryStore::default();
        let alice = create_user(&store, "alice", "alice@example.com", "old-password").await.unwrap();
        let token = tokens().issue(alice.id, alice.password_version).unwrap();

        let err = reset_password(&store, &tokens(), &token, "one-password", "other-password")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::Invalid { field: "confirm_password", .. })
        ));
        assert!(user_for_reset_token(&store, &tokens(), &token).await.is_ok());
    }
}
