use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{Mailer, Notification, NotificationSink, OutgoingEmail, SinkError};
use crate::config::LinkConfig;

pub type NotificationReceiver = mpsc::Receiver<Notification>;

/// Bounded in-process queue in front of the delivery worker.
#[derive(Clone)]
pub struct QueueSink {
    tx: mpsc::Sender<Notification>,
}

impl QueueSink {
    pub fn new(capacity: usize) -> (Self, NotificationReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl NotificationSink for QueueSink {
    fn submit(&self, notification: Notification) -> Result<(), SinkError> {
        let kind = notification.kind();
        self.tx.try_send(notification).map_err(|e| {
            let err = match e {
                mpsc::error::TrySendError::Full(_) => SinkError::Full,
                mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
            };
            warn!(kind, error = %err, "notification rejected");
            err
        })
    }
}

/// Drain the queue until every sender is dropped.
pub fn spawn_delivery_worker(
    mut rx: NotificationReceiver,
    mailer: Arc<dyn Mailer>,
    links: LinkConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("notification worker started");

        while let Some(notification) = rx.recv().await {
            if let Ok(payload) = serde_json::to_string(&notification) {
                debug!(%payload, "notification received");
            }
            let email = OutgoingEmail::render(&notification, &links);
            match mailer.send(&email).await {
                Ok(()) => info!(kind = notification.kind(), to = %email.to, "notification delivered"),
                Err(e) => error!(kind = notification.kind(), to = %email.to, error = %e, "notification delivery failed"),
            }
        }

        info!("notification worker stopped (channel closed)");
    })
}
