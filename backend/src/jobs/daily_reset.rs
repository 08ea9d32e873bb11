use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{JobError, ScheduledJob};
use crate::services::MaintenanceStore;

/// Restores every active user's daily allowance. Safe to run more than once a
/// day: the store only touches users not yet reset today.
pub struct DailyResetJob {
    store: Arc<dyn MaintenanceStore>,
}

impl DailyResetJob {
    pub fn new(store: Arc<dyn MaintenanceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ScheduledJob for DailyResetJob {
    fn name(&self) -> &'static str {
        "daily spin reset"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<u64, JobError> {
        let reset = self.store.reset_all_daily_spins(now).await?;
        info!("🔄 Daily spins restored for {} users", reset);
        Ok(reset)
    }
}
