use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User, UserRow, UserStatus};
use crate::error::{AuthError, AuthResult};

const USER_COLUMNS: &str = "id, name, email, password_hash, verified, verification_token, \
                            status, slug, created_at, updated_at";

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`AuthError::DuplicateEmail`] when the email is taken.
    async fn insert(&self, new: NewUser) -> AuthResult<User>;
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;
    async fn set_verification_token(&self, id: Uuid, token: &str) -> AuthResult<()>;
    /// Marks the user verified only if `token` is the pending one, and clears it.
    /// Returns `None` when nothing matched.
    async fn mark_verified(&self, email: &str, token: &str) -> AuthResult<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_user(row: Option<UserRow>) -> AuthResult<Option<User>> {
    Ok(row.map(User::try_from).transpose()?)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, new: NewUser) -> AuthResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, verification_token, status, slug)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.verification_token)
        .bind(UserStatus::Active.as_str())
        .bind(&new.slug)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AuthError::DuplicateEmail;
                }
            }
            AuthError::from(e)
        })?;
        Ok(User::try_from(row)?)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }

    async fn set_verification_token(&self, id: Uuid, token: &str) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET verification_token = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn mark_verified(&self, email: &str, token: &str) -> AuthResult<Option<User>> {
        // Match and clear in one statement so a token is consumed at most once.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET verified = TRUE, verification_token = NULL, updated_at = now()
            WHERE email = $1 AND verification_token = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }
}
