use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use tracing::{info, warn};

use crate::auth::{
    password::{hash_password, verify_password},
    repo::UserStore,
    repo_types::{NewUser, User, UserStatus},
};
use crate::error::{AuthError, AuthResult};

/// Length of one-time verification and reset tokens.
pub const ONE_TIME_TOKEN_LEN: usize = 32;
const SLUG_LEN: usize = 20;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Random alphanumeric string from the thread-local CSPRNG.
pub(crate) fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Register a new, unverified, active user with a pending verification token.
pub async fn create_user(
    users: &dyn UserStore,
    name: &str,
    email: &str,
    password: &str,
) -> AuthResult<User> {
    let email = normalize_email(email);
    if users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let password_hash = hash_password(password)?;
    let user = users
        .insert(NewUser {
            name: name.trim().to_string(),
            email,
            password_hash,
            verification_token: random_token(ONE_TIME_TOKEN_LEN),
            slug: random_token(SLUG_LEN),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn find_by_email(users: &dyn UserStore, email: &str) -> AuthResult<User> {
    users
        .find_by_email(&normalize_email(email))
        .await?
        .ok_or(AuthError::NotFound("User"))
}

/// Check credentials. Unknown email, wrong password and suspended accounts all
/// look the same to the caller.
pub async fn authenticate(users: &dyn UserStore, email: &str, password: &str) -> AuthResult<User> {
    let email = normalize_email(email);
    let Some(user) = users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AuthError::Unauthorized);
    };

    if !verify_password(password, &user.password_hash) {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AuthError::Unauthorized);
    }

    if user.status == UserStatus::Suspended {
        warn!(user_id = %user.id, "login by suspended user");
        return Err(AuthError::Unauthorized);
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

/// Consume the pending verification token of `email`.
pub async fn mark_verified(users: &dyn UserStore, email: &str, token: &str) -> AuthResult<User> {
    users
        .mark_verified(&normalize_email(email), token)
        .await?
        .ok_or(AuthError::NotFound("User"))
}
