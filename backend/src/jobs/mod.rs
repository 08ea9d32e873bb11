//! Background work that runs on a local-time schedule: the midnight spin
//! reset and the reminder notifier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::error::StoreError;
use crate::services::MaintenanceStore;

pub mod daily_reset;
pub mod notifier;
pub mod scheduler;

pub use daily_reset::DailyResetJob;
pub use notifier::{LogSender, NotificationSender, ScheduledNotifier};
pub use scheduler::{JobSlot, RetryPolicy};

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs once for the tick at `now`. Returns how many records or messages
    /// the run touched.
    async fn run(&self, now: DateTime<Utc>) -> Result<u64, JobError>;
}

/// A failed reset is retried every minute for an hour. Repeat runs on the same
/// local day touch no one.
pub const DAILY_RESET_RETRY: RetryPolicy = RetryPolicy {
    delay: Duration::from_secs(60),
    max_attempts: 60,
};

pub fn daily_reset_slot(store: Arc<dyn MaintenanceStore>) -> JobSlot {
    JobSlot::new(Arc::new(DailyResetJob::new(store))).with_retry(DAILY_RESET_RETRY)
}

pub fn spawn_background_jobs(
    config: &AppConfig,
    store: Arc<dyn MaintenanceStore>,
    sender: Arc<dyn NotificationSender>,
) -> Vec<JoinHandle<()>> {
    let reset = daily_reset_slot(store.clone());
    let notify = JobSlot::new(Arc::new(ScheduledNotifier::new(store, sender, config.timezone)));

    // A midnight missed while the process was down is made up now.
    let mut handles: Vec<JoinHandle<()>> = reset.catch_up().into_iter().collect();
    handles.push(reset.spawn(config.daily_reset_schedule.clone(), config.timezone));
    handles.push(notify.spawn(config.notify_schedule.clone(), config.timezone));
    handles
}
