use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        repo::UserStore,
        repo_types::User,
        services::{mark_verified, random_token, ONE_TIME_TOKEN_LEN},
    },
    crypto::EmailCipher,
    error::AuthResult,
    notify::{MailDetails, Notification, NotificationSink},
    state::AppState,
};

/// Email ownership check: `unverified -> verified`, never back.
#[derive(Clone)]
pub struct VerificationWorkflow {
    users: Arc<dyn UserStore>,
    cipher: Arc<EmailCipher>,
    sink: Arc<dyn NotificationSink>,
}

impl FromRef<AppState> for VerificationWorkflow {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.cipher.clone(), state.notifier.clone())
    }
}

impl VerificationWorkflow {
    pub fn new(
        users: Arc<dyn UserStore>,
        cipher: Arc<EmailCipher>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { users, cipher, sink }
    }

    /// Queue the verification email for the user's pending token. A user without
    /// one gets a fresh token stored first. Returns the token.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn initiate(&self, user: &User) -> AuthResult<String> {
        let token = match &user.verification_token {
            Some(token) => token.clone(),
            None => {
                let token = random_token(ONE_TIME_TOKEN_LEN);
                self.users.set_verification_token(user.id, &token).await?;
                token
            }
        };

        let encrypted_email = self.cipher.encrypt(&user.email)?;
        self.sink.submit(Notification::VerifyAccount(MailDetails {
            name: user.name.clone(),
            email: user.email.clone(),
            encrypted_email,
            token: token.clone(),
        }))?;

        info!("verification email queued");
        Ok(token)
    }

    /// Consume a verification link. The token is cleared in the same write that
    /// sets the flag, so a second confirmation finds nothing.
    #[instrument(skip(self, token, encrypted_email))]
    pub async fn confirm(&self, token: &str, encrypted_email: &str) -> AuthResult<User> {
        let email = self.cipher.decrypt(encrypted_email)?;
        let user = mark_verified(self.users.as_ref(), &email, token)
            .await
            .map_err(|e| {
                warn!(email = %email, "verification token did not match");
                e
            })?;
        info!(user_id = %user.id, "email verified");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::create_user;
    use crate::error::AuthError;
    use crate::testing::Harness;

    async fn registered(h: &Harness) -> User {
        create_user(h.users.as_ref(), "Alice", "alice@x.com", "secret1")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn initiate_persists_token_and_queues_email() {
        let h = Harness::new();
        let wf = VerificationWorkflow::from_ref(&h.state);
        let user = registered(&h).await;

        let token = wf.initiate(&user).await.unwrap();
        assert!(token.len() >= 20);

        let stored = h.users.get("alice@x.com").unwrap();
        assert!(!stored.verified);
        assert_eq!(stored.verification_token.as_deref(), Some(token.as_str()));

        let sent = h.sink.submitted();
        assert_eq!(sent.len(), 1);
        let Notification::VerifyAccount(d) = &sent[0] else {
            panic!("expected a verification email, got {:?}", sent[0]);
        };
        assert_eq!(d.email, "alice@x.com");
        assert_eq!(d.token, token);
        assert_eq!(h.state.cipher.decrypt(&d.encrypted_email).unwrap(), "alice@x.com");
    }

    #[tokio::test]
    async fn confirm_verifies_once() {
        let h = Harness::new();
        let wf = VerificationWorkflow::from_ref(&h.state);
        let user = registered(&h).await;
        let token = wf.initiate(&user).await.unwrap();
        let enc = h.state.cipher.encrypt("alice@x.com").unwrap();

        let verified = wf.confirm(&token, &enc).await.unwrap();
        assert!(verified.verified);
        assert!(verified.verification_token.is_none());

        let again = wf.confirm(&token, &enc).await.unwrap_err();
        assert!(matches!(again, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn confirm_rejects_wrong_token_and_garbage_email() {
        let h = Harness::new();
        let wf = VerificationWorkflow::from_ref(&h.state);
        let user = registered(&h).await;
        wf.initiate(&user).await.unwrap();
        let enc = h.state.cipher.encrypt("alice@x.com").unwrap();

        assert!(matches!(
            wf.confirm("wrong-token", &enc).await,
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(
            wf.confirm("whatever", "%%%").await,
            Err(AuthError::Decryption)
        ));
        assert!(!h.users.get("alice@x.com").unwrap().verified);
    }

    #[tokio::test]
    async fn token_of_another_user_does_not_verify() {
        let h = Harness::new();
        let wf = VerificationWorkflow::from_ref(&h.state);
        let alice = registered(&h).await;
        let bob = create_user(h.users.as_ref(), "Bob", "bob@x.com", "secret1")
            .await
            .unwrap();
        let alice_token = wf.initiate(&alice).await.unwrap();
        wf.initiate(&bob).await.unwrap();

        let bob_enc = h.state.cipher.encrypt("bob@x.com").unwrap();
        assert!(wf.confirm(&alice_token, &bob_enc).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_confirmations_succeed_once() {
        let h = Harness::new();
        let wf = VerificationWorkflow::from_ref(&h.state);
        let user = registered(&h).await;
        let token = wf.initiate(&user).await.unwrap();
        let enc = h.state.cipher.encrypt("alice@x.com").unwrap();

        let (a, b) = tokio::join!(wf.confirm(&token, &enc), wf.confirm(&token, &enc));
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn initiate_reuses_the_token_stored_at_registration() {
        let h = Harness::new();
        let wf = VerificationWorkflow::from_ref(&h.state);
        let user = registered(&h).await;
        h.users.fail_token_writes(true);

        let token = wf.initiate(&user).await.unwrap();
        assert_eq!(user.verification_token.as_deref(), Some(token.as_str()));
        assert_eq!(h.sink.submitted().len(), 1);
    }

    #[tokio::test]
    async fn user_without_token_gets_one_before_the_email() {
        let h = Harness::new();
        let wf = VerificationWorkflow::from_ref(&h.state);
        registered(&h).await;
        h.users.clear_verification_token("alice@x.com");
        let user = h.users.get("alice@x.com").unwrap();

        let token = wf.initiate(&user).await.unwrap();
        let stored = h.users.get("alice@x.com").unwrap();
        assert_eq!(stored.verification_token.as_deref(), Some(token.as_str()));

        h.users.clear_verification_token("alice@x.com");
        h.users.fail_token_writes(true);
        assert!(matches!(wf.initiate(&user).await, Err(AuthError::Internal(_))));
        assert_eq!(h.sink.submitted().len(), 1);
    }

    #[tokio::test]
    async fn rejected_notification_still_leaves_pending_token() {
        let h = Harness::rejecting_notifications();
        let wf = VerificationWorkflow::from_ref(&h.state);
        let user = registered(&h).await;

        assert!(matches!(wf.initiate(&user).await, Err(AuthError::Notification(_))));
        assert!(h.users.get("alice@x.com").unwrap().verification_token.is_some());
    }
}
