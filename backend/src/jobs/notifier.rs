use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use super::{JobError, ScheduledJob};
use crate::clock::local_date;
use crate::services::MaintenanceStore;

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, recipient: &str, body: &str) -> Result<(), JobError>;
}

/// Writes each delivery to the log instead of a gateway.
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, recipient: &str, body: &str) -> Result<(), JobError> {
        info!(recipient = recipient, "📨 Reminder: {}", body);
        Ok(())
    }
}

/// Sends due reminders to users who still have today's spin. Each reminder is
/// claimed for the local day before sending, so it goes out at most once a
/// day even with several instances running.
pub struct ScheduledNotifier {
    store: Arc<dyn MaintenanceStore>,
    sender: Arc<dyn NotificationSender>,
    timezone: Tz,
}

impl ScheduledNotifier {
    pub fn new(store: Arc<dyn MaintenanceStore>, sender: Arc<dyn NotificationSender>, timezone: Tz) -> Self {
        Self {
            store,
            sender,
            timezone,
        }
    }
}

#[async_trait]
impl ScheduledJob for ScheduledNotifier {
    fn name(&self) -> &'static str {
        "reminder notifier"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<u64, JobError> {
        let today = local_date(now, self.timezone);
        let due = self.store.due_notifications(now).await?;
        let mut delivered = 0;

        for message in due {
            if !self
                .store
                .claim_notification_run(message.notification_id, today)
                .await?
            {
                debug!("Reminder {} already sent for {}", message.notification_id, today);
                continue;
            }

            for recipient in &message.recipients {
                match self.sender.send(recipient, &message.body).await {
                    Ok(()) => delivered += 1,
                    Err(e) => warn!("reminder to {} failed: {}", recipient, e),
                }
            }
        }

        Ok(delivered)
    }
}
