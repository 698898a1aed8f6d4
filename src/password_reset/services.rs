use std::sync::Arc;

use axum::extract::FromRef;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use super::{
    repo::ResetStore,
    repo_types::{PasswordReset, Redemption},
};
use crate::{
    auth::{
        password::hash_password,
        repo::UserStore,
        services::{find_by_email, normalize_email, random_token, ONE_TIME_TOKEN_LEN},
    },
    crypto::EmailCipher,
    error::{AuthError, AuthResult},
    notify::{MailDetails, Notification, NotificationSink},
    state::AppState,
};

#[derive(Clone)]
pub struct PasswordResetWorkflow {
    users: Arc<dyn UserStore>,
    resets: Arc<dyn ResetStore>,
    cipher: Arc<EmailCipher>,
    sink: Arc<dyn NotificationSink>,
    /// Maximum record age; `None` disables the check.
    ttl: Option<Duration>,
}

impl FromRef<AppState> for PasswordResetWorkflow {
    fn from_ref(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            resets: state.resets.clone(),
            cipher: state.cipher.clone(),
            sink: state.notifier.clone(),
            ttl: state.config.reset_ttl_minutes.map(Duration::minutes),
        }
    }
}

impl PasswordResetWorkflow {
    /// Queue a reset email and, once the queue accepted it, store the reset record.
    /// An unknown email is reported as such.
    #[instrument(skip_all)]
    pub async fn request_reset(&self, email: &str) -> AuthResult<()> {
        let user = find_by_email(self.users.as_ref(), email).await.map_err(|e| {
            if matches!(e, AuthError::NotFound(_)) {
                warn!(email = %normalize_email(email), "reset requested for unknown email");
            }
            e
        })?;

        let token = random_token(ONE_TIME_TOKEN_LEN);
        let encrypted_email = self.cipher.encrypt(&user.email)?;
        self.sink.submit(Notification::PasswordReset(MailDetails {
            name: user.name.clone(),
            email: user.email.clone(),
            encrypted_email,
            token: token.clone(),
        }))?;

        self.resets
            .replace(PasswordReset {
                email: user.email.clone(),
                token,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(user_id = %user.id, "password reset requested");
        Ok(())
    }

    /// Redeem a reset token and set the new password. The record is consumed in
    /// the same transaction that stores the new hash, so a token works once and
    /// survives a failed write.
    #[instrument(skip_all)]
    pub async fn complete_reset(
        &self,
        encrypted_email: &str,
        token: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let email = self.cipher.decrypt(encrypted_email)?;
        let user = find_by_email(self.users.as_ref(), &email).await?;
        let password_hash = hash_password(new_password)?;
        let issued_after = self.ttl.map(|ttl| OffsetDateTime::now_utc() - ttl);

        match self
            .resets
            .redeem(&user.email, token, user.id, &password_hash, issued_after)
            .await?
        {
            Redemption::Redeemed => {
                info!(user_id = %user.id, "password reset completed");
                Ok(())
            }
            Redemption::Expired => {
                warn!(user_id = %user.id, "reset token expired");
                Err(AuthError::ExpiredResetToken)
            }
            Redemption::NoMatch => Err(AuthError::InvalidResetToken),
        }
    }
}
