use std::sync::Arc;

use crate::config::AppConfig;
use crate::notify::{spawn_delivery_worker, LogMailer, Mailer, QueueSink, SmtpMailer};
use crate::state::AppState;

mod app;
mod auth;
mod config;
mod crypto;
mod db;
mod error;
mod notify;
mod password_reset;
mod state;
#[cfg(test)]
mod testing;
mod verification;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "authgate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let db = db::connect(&config).await?;
    db::migrate(&db).await?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP_HOST not set; outgoing emails are only logged");
            Arc::new(LogMailer)
        }
    };
    let (sink, rx) = QueueSink::new(config.notify_queue_capacity);
    let worker = spawn_delivery_worker(rx, mailer, config.links.clone());

    let state = AppState::init(config, db, Arc::new(sink))?;
    app::serve(app::build_app(state)).await?;

    // Router and state are gone, so the queue closes and the worker drains it.
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "notification worker panicked");
    }
    Ok(())
}
