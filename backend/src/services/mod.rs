//! Storage seams. The spin engine, the scheduled jobs and the staff routes
//! each see only the narrow trait they need; Postgres implements all three.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::StoreError;
use crate::models::{
    PendingMessage, RedeemOutcome, Reward, ScheduledNotification, User, WheelItem, WheelItemDraft,
};

#[cfg(test)]
pub mod memory_store;
pub mod pg_store;

pub use pg_store::PgStore;

/// What the coordinator read before drawing. The commit only applies if the
/// user row still matches it and the user has not spun since
/// `day_started_at`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedPriorState {
    pub spins_remaining: i32,
    pub last_spin_at: Option<DateTime<Utc>>,
    pub day_started_at: DateTime<Utc>,
}

impl ExpectedPriorState {
    pub fn of(user: &User, day_started_at: DateTime<Utc>) -> Self {
        Self {
            spins_remaining: user.spins_remaining,
            last_spin_at: user.last_spin_at,
            day_started_at,
        }
    }

    /// The conditional-write predicate, shared by every store.
    pub fn still_holds(&self, current: &User) -> bool {
        current.spins_remaining == self.spins_remaining
            && current.spins_remaining > 0
            && current.last_spin_at == self.last_spin_at
            && current
                .last_spin_at
                .map_or(true, |last| last < self.day_started_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Reward inserted, counter decremented, last spin stamped.
    Committed,
    /// The user row changed since it was read; nothing was written.
    Conflict,
    /// The reward code already exists; nothing was written.
    DuplicateCode,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub daily_spin_allowance: i32,
    pub timezone: Tz,
}

impl From<&AppConfig> for StoreSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            daily_spin_allowance: config.daily_spin_allowance,
            timezone: config.timezone,
        }
    }
}

#[async_trait]
pub trait SpinStore: Send + Sync {
    async fn load_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Active items in a stable order so equal draws pick equal items.
    async fn load_active_wheel_items(&self) -> Result<Vec<WheelItem>, StoreError>;

    /// Inserts `reward` and debits the user's allowance as one unit, or
    /// writes nothing at all.
    async fn commit_spin(
        &self,
        user_id: Uuid,
        reward: &Reward,
        expected: &ExpectedPriorState,
    ) -> Result<CommitOutcome, StoreError>;

    async fn find_most_recent_unused_reward(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Reward>, StoreError>;
}

#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Restores every active user's allowance once per local day. Returns the
    /// number of users touched; a second call on the same day touches none.
    async fn reset_all_daily_spins(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Reminders whose local send time has passed and that have not run today.
    async fn due_notifications(&self, now: DateTime<Utc>) -> Result<Vec<PendingMessage>, StoreError>;

    /// Marks a reminder as run for `run_on`. Only the caller that gets `true`
    /// may send it.
    async fn claim_notification_run(
        &self,
        notification_id: Uuid,
        run_on: NaiveDate,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait StaffStore: Send + Sync {
    async fn list_wheel_items(&self) -> Result<Vec<WheelItem>, StoreError>;

    async fn create_wheel_item(
        &self,
        draft: &WheelItemDraft,
        now: DateTime<Utc>,
    ) -> Result<WheelItem, StoreError>;

    async fn update_wheel_item(
        &self,
        id: Uuid,
        draft: &WheelItemDraft,
        now: DateTime<Utc>,
    ) -> Result<Option<WheelItem>, StoreError>;

    async fn deactivate_wheel_item(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<WheelItem>, StoreError>;

    async fn redeem_reward(&self, code: &str, now: DateTime<Utc>) -> Result<RedeemOutcome, StoreError>;

    /// Staff override for a redemption marked by mistake.
    async fn revoke_redemption(&self, code: &str) -> Result<Option<Reward>, StoreError>;

    async fn create_notification(
        &self,
        message: &str,
        send_time: NaiveTime,
    ) -> Result<ScheduledNotification, StoreError>;

    async fn list_notifications(&self) -> Result<Vec<ScheduledNotification>, StoreError>;
}
