//! In-memory stand-ins for the Postgres stores, the notification queue and the mailer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, User, UserStatus};
use crate::config::{AppConfig, JwtConfig, LinkConfig};
use crate::crypto::test_cipher;
use crate::error::{AuthError, AuthResult};
use crate::notify::{Mailer, Notification, NotificationSink, OutgoingEmail, SinkError};
use crate::password_reset::repo::ResetStore;
use crate::password_reset::repo_types::{PasswordReset, Redemption};
use crate::state::AppState;

pub fn test_links() -> LinkConfig {
    LinkConfig {
        app_url: "http://api.test".into(),
        frontend_url: "http://app.test".into(),
        verify_success_url: "http://app.test/verify/success".into(),
        verify_invalid_url: "http://app.test/verify/invalid_token".into(),
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test".into(),
            audience: "test".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        email_cipher_key: String::new(),
        links: test_links(),
        reset_ttl_minutes: None,
        notify_queue_capacity: 8,
        smtp: None,
    }
}

/// Users keyed by email.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
    fail_token_writes: AtomicBool,
    fail_password_writes: AtomicBool,
}

impl MemoryUserStore {
    pub fn fail_token_writes(&self, fail: bool) {
        self.fail_token_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_password_writes(&self, fail: bool) {
        self.fail_password_writes.store(fail, Ordering::SeqCst);
    }

    pub fn clear_verification_token(&self, email: &str) {
        if let Some(user) = self.users.lock().unwrap().get_mut(email) {
            user.verification_token = None;
        }
    }

    fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AuthResult<()> {
        if self.fail_password_writes.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("password write refused").into());
        }
        let mut users = self.users.lock().unwrap();
        let user = users
            .values_mut()
            .find(|u| u.id == id)
            .ok_or(AuthError::NotFound("User"))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    pub fn get(&self, email: &str) -> Option<User> {
        self.users.lock().unwrap().get(email).cloned()
    }

    pub fn set_status(&self, id: Uuid, status: UserStatus) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.values_mut().find(|u| u.id == id) {
            user.status = status;
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser) -> AuthResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&new.email) {
            return Err(AuthError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email.clone(),
            password_hash: new.password_hash,
            verified: false,
            verification_token: Some(new.verification_token),
            status: UserStatus::Active,
            slug: new.slug,
            created_at: now,
            updated_at: now,
        };
        users.insert(new.email, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(self.get(email))
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.id == id).cloned())
    }

    async fn set_verification_token(&self, id: Uuid, token: &str) -> AuthResult<()> {
        if self.fail_token_writes.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("token write refused").into());
        }
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.values_mut().find(|u| u.id == id) {
            user.verification_token = Some(token.to_string());
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn mark_verified(&self, email: &str, token: &str) -> AuthResult<Option<User>> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(email) {
            Some(user) if user.verification_token.as_deref() == Some(token) => {
                user.verified = true;
                user.verification_token = None;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(Some(user.clone()))
            }
            _ => Ok(None),
        }
    }
}

/// Reset records; redemption writes the password into the paired user store.
pub struct MemoryResetStore {
    records: Mutex<Vec<PasswordReset>>,
    users: Arc<MemoryUserStore>,
}

impl MemoryResetStore {
    pub fn new(users: Arc<MemoryUserStore>) -> Self {
        Self {
            records: Mutex::default(),
            users,
        }
    }

    pub fn records(&self) -> Vec<PasswordReset> {
        self.records.lock().unwrap().clone()
    }

    /// Push the record for `email` into the past by `age`.
    pub fn backdate(&self, email: &str, age: Duration) {
        let mut records = self.records.lock().unwrap();
        for r in records.iter_mut().filter(|r| r.email == email) {
            r.created_at -= age;
        }
    }
}

#[async_trait]
impl ResetStore for MemoryResetStore {
    async fn replace(&self, record: PasswordReset) -> AuthResult<()> {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.email != record.email);
        records.push(record);
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
        let mut records = self.records.lock().unwrap();
        let Some(pos) = records.iter().position(|r| r.email == email && r.token == token) else {
            return Ok(Redemption::NoMatch);
        };
        if issued_after.is_some_and(|cutoff| records[pos].created_at < cutoff) {
            records.remove(pos);
            return Ok(Redemption::Expired);
        }
        self.users.set_password_hash(user_id, password_hash)?;
        records.remove(pos);
        Ok(Redemption::Redeemed)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    submitted: Mutex<Vec<Notification>>,
    reject: bool,
}

impl RecordingSink {
    pub fn rejecting() -> Self {
        Self {
            submitted: Mutex::default(),
            reject: true,
        }
    }

    pub fn submitted(&self) -> Vec<Notification> {
        self.submitted.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn submit(&self, notification: Notification) -> Result<(), SinkError> {
        if self.reject {
            return Err(SinkError::Full);
        }
        self.submitted.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail_for: Option<String>,
}

impl RecordingMailer {
    pub fn failing_for(address: &str) -> Self {
        Self {
            sent: Mutex::default(),
            fail_for: Some(address.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        if self.fail_for.as_deref() == Some(email.to.as_str()) {
            anyhow::bail!("smtp refused {}", email.to);
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// App state wired to the in-memory fakes, with handles to inspect them.
pub struct Harness {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub resets: Arc<MemoryResetStore>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sink(RecordingSink::default())
    }

    pub fn rejecting_notifications() -> Self {
        Self::with_sink(RecordingSink::rejecting())
    }

    fn with_sink(sink: RecordingSink) -> Self {
        let users = Arc::new(MemoryUserStore::default());
        let resets = Arc::new(MemoryResetStore::new(users.clone()));
        let sink = Arc::new(sink);
        let state = AppState::from_parts(
            Arc::new(test_config()),
            users.clone(),
            resets.clone(),
            Arc::new(test_cipher()),
            sink.clone(),
        );
        Self {
            state,
            users,
            resets,
            sink,
        }
    }
}
