use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{PasswordReset, Redemption};
use crate::error::{AuthError, AuthResult};

#[async_trait]
pub trait ResetStore: Send + Sync {
    /// Store `record`, dropping any older record for the same email.
    async fn replace(&self, record: PasswordReset) -> AuthResult<()>;
    /// Consume the record matching `email` and `token` and store `password_hash`
    /// for `user_id`, as one unit. A failed password write leaves the record in
    /// place. A record created before `issued_after` is consumed without
    /// touching the password.
    async fn redeem(
        &self,
        email: &str,
        token: &str,
        user_id: Uuid,
        password_hash: &str,
        issued_after: Option<OffsetDateTime>,
    ) -> AuthResult<Redemption>;
}

#[derive(Clone)]
pub struct PgResetStore {
    db: PgPool,
}

impl PgResetStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResetStore for PgResetStore {
    async fn replace(&self, record: PasswordReset) -> AuthResult<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM password_resets WHERE email = $1")
            .bind(&record.email)
            .execute(&mut *tx)
            .await
            .context("delete previous reset records")?;
        sqlx::query(
            r#"
            INSERT INTO password_resets (email, token, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&record.email)
        .bind(&record.token)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .context("insert reset record")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn redeem(
        &self,
        email: &str,
        token: &str,
        user_id: Uuid,
        password_hash: &str,
        issued_after: Option<OffsetDateTime>,
    ) -> AuthResult<Redemption> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // Delete-returning keeps match and removal atomic; dropping `tx` rolls it back.
        let record = sqlx::query_as::<_, PasswordReset>(
            r#"
            DELETE FROM password_resets
            WHERE email = $1 AND token = $2
            RETURNING email, token, created_at
            "#,
        )
        .bind(email)
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            return Ok(Redemption::NoMatch);
        };

        if issued_after.is_some_and(|cutoff| record.created_at < cutoff) {
            tx.commit().await.context("commit tx")?;
            return Ok(Redemption::Expired);
        }

        let res = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Err(AuthError::NotFound("User"));
        }

        tx.commit().await.context("commit tx")?;
        Ok(Redemption::Redeemed)
    }
}
