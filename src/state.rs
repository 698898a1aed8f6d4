use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::crypto::EmailCipher;
use crate::notify::NotificationSink;
use crate::password_reset::repo::{PgResetStore, ResetStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub resets: Arc<dyn ResetStore>,
    pub cipher: Arc<EmailCipher>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl AppState {
    /// Postgres-backed state.
    pub fn init(
        config: Arc<AppConfig>,
        db: PgPool,
        notifier: Arc<dyn NotificationSink>,
    ) -> anyhow::Result<Self> {
        let cipher = Arc::new(EmailCipher::from_base64_key(&config.email_cipher_key)?);
        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgResetStore::new(db)),
            cipher,
            notifier,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        resets: Arc<dyn ResetStore>,
        cipher: Arc<EmailCipher>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            users,
            resets,
            cipher,
            notifier,
        }
    }
}
