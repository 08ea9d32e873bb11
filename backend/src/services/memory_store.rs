//! In-process store for tests, with switches for the failures Postgres can
//! produce: lost connections mid-commit, slow commits, code collisions and
//! outright unavailability.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CommitOutcome, ExpectedPriorState, MaintenanceStore, SpinStore, StaffStore, StoreSettings,
};
use crate::clock::{local_date, start_of_day_containing};
use crate::error::StoreError;
use crate::models::{
    PendingMessage, RedeemOutcome, Reward, ScheduledNotification, User, WheelItem, WheelItemDraft,
};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    phone: Option<String>,
    active: bool,
    spins_reset_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, StoredUser>,
    items: Vec<WheelItem>,
    rewards: Vec<Reward>,
    notifications: Vec<ScheduledNotification>,
}

#[derive(Debug, Default)]
struct Faults {
    crash_next_commit: bool,
    commit_delay: Option<Duration>,
    duplicate_codes: u32,
    unavailable: bool,
}

pub struct MemoryStore {
    state: Mutex<MemoryState>,
    faults: Mutex<Faults>,
    settings: StoreSettings,
}

impl MemoryStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            faults: Mutex::new(Faults::default()),
            settings,
        }
    }

    pub async fn insert_user(&self, spins_remaining: i32, last_spin_at: Option<DateTime<Utc>>) -> Uuid {
        self.insert_user_with_phone(spins_remaining, last_spin_at, None).await
    }

    pub async fn insert_user_with_phone(
        &self,
        spins_remaining: i32,
        last_spin_at: Option<DateTime<Utc>>,
        phone: Option<&str>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let stored = StoredUser {
            user: User {
                id,
                spins_remaining,
                last_spin_at,
            },
            phone: phone.map(str::to_string),
            active: true,
            spins_reset_at: None,
        };
        self.state.lock().await.users.insert(id, stored);
        id
    }

    pub async fn deactivate_user(&self, id: Uuid) {
        if let Some(stored) = self.state.lock().await.users.get_mut(&id) {
            stored.active = false;
        }
    }

    pub async fn add_item(&self, title: &str, weight: f64) -> WheelItem {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        // Keep creation order strictly increasing for the ordering contract.
        let created_at = state
            .items
            .last()
            .map_or(now, |last| last.created_at.max(now) + chrono::Duration::microseconds(1));
        let item = WheelItem {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            color: "#FFAA00".to_string(),
            weight,
            active: true,
            created_at,
            updated_at: created_at,
        };
        state.items.push(item.clone());
        item
    }

    pub async fn insert_reward(&self, reward: Reward) {
        self.state.lock().await.rewards.push(reward);
    }

    pub async fn user(&self, id: Uuid) -> Option<User> {
        self.state.lock().await.users.get(&id).map(|stored| stored.user)
    }

    pub async fn rewards(&self) -> Vec<Reward> {
        self.state.lock().await.rewards.clone()
    }

    pub async fn crash_next_commit(&self) {
        self.faults.lock().await.crash_next_commit = true;
    }

    pub async fn set_commit_delay(&self, delay: Option<Duration>) {
        self.faults.lock().await.commit_delay = delay;
    }

    pub async fn force_duplicate_codes(&self, count: u32) {
        self.faults.lock().await.duplicate_codes = count;
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().await.unavailable = unavailable;
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        if self.faults.lock().await.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

fn find_reward<'a>(state: &'a mut MemoryState, code: &str) -> Option<&'a mut Reward> {
    state.rewards.iter_mut().find(|r| r.code == code)
}

#[async_trait]
impl SpinStore for MemoryStore {
    async fn load_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.check_available().await?;
        let state = self.state.lock().await;
        Ok(state
            .users
            .get(&user_id)
            .filter(|stored| stored.active)
            .map(|stored| stored.user))
    }

    async fn load_active_wheel_items(&self) -> Result<Vec<WheelItem>, StoreError> {
        self.check_available().await?;
        let state = self.state.lock().await;
        let mut items: Vec<WheelItem> = state.items.iter().filter(|i| i.active).cloned().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn commit_spin(
        &self,
        user_id: Uuid,
        reward: &Reward,
        expected: &ExpectedPriorState,
    ) -> Result<CommitOutcome, StoreError> {
        self.check_available().await?;
        let delay = self.faults.lock().await.commit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        let mut staged = state.clone();

        let Some(stored) = staged.users.get_mut(&user_id).filter(|s| s.active) else {
            return Ok(CommitOutcome::Conflict);
        };
        if !expected.still_holds(&stored.user) {
            return Ok(CommitOutcome::Conflict);
        }
        stored.user.spins_remaining -= 1;
        stored.user.last_spin_at = Some(reward.created_at);

        {
            let mut faults = self.faults.lock().await;
            if faults.duplicate_codes > 0 {
                faults.duplicate_codes -= 1;
                return Ok(CommitOutcome::DuplicateCode);
            }
        }
        if staged.rewards.iter().any(|r| r.code == reward.code) {
            return Ok(CommitOutcome::DuplicateCode);
        }
        staged.rewards.push(reward.clone());

        {
            let mut faults = self.faults.lock().await;
            if faults.crash_next_commit {
                faults.crash_next_commit = false;
                return Err(StoreError::Unavailable("connection lost during commit".to_string()));
            }
        }

        *state = staged;
        Ok(CommitOutcome::Committed)
    }

    async fn find_most_recent_unused_reward(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Reward>, StoreError> {
        self.check_available().await?;
        let state = self.state.lock().await;
        Ok(state
            .rewards
            .iter()
            .filter(|r| r.user_id == user_id && !r.used && r.expires_at > now)
            .max_by_key(|r| r.created_at)
            .cloned())
    }
}

#[async_trait]
impl MaintenanceStore for MemoryStore {
    async fn reset_all_daily_spins(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_available().await?;
        let day_started_at = start_of_day_containing(now, self.settings.timezone);
        let mut state = self.state.lock().await;
        let mut touched = 0;
        for stored in state.users.values_mut().filter(|s| s.active) {
            if stored.spins_reset_at.map_or(true, |at| at < day_started_at) {
                stored.user.spins_remaining = self.settings.daily_spin_allowance;
                stored.spins_reset_at = Some(now);
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn due_notifications(&self, now: DateTime<Utc>) -> Result<Vec<PendingMessage>, StoreError> {
        self.check_available().await?;
        let timezone = self.settings.timezone;
        let local_now = now.with_timezone(&timezone);
        let today = local_date(now, timezone);
        let day_started_at = start_of_day_containing(now, timezone);
        let state = self.state.lock().await;

        let mut recipients: Vec<String> = state
            .users
            .values()
            .filter(|s| s.active)
            .filter(|s| s.user.last_spin_at.map_or(true, |last| last < day_started_at))
            .filter_map(|s| s.phone.clone())
            .collect();
        recipients.sort();

        Ok(state
            .notifications
            .iter()
            .filter(|n| n.active && n.send_time <= local_now.time())
            .filter(|n| n.last_sent_on.map_or(true, |sent| sent < today))
            .map(|n| PendingMessage {
                notification_id: n.id,
                body: n.message.clone(),
                recipients: recipients.clone(),
            })
            .collect())
    }

    async fn claim_notification_run(
        &self,
        notification_id: Uuid,
        run_on: NaiveDate,
    ) -> Result<bool, StoreError> {
        self.check_available().await?;
        let mut state = self.state.lock().await;
        match state.notifications.iter_mut().find(|n| n.id == notification_id) {
            Some(n) if n.last_sent_on.map_or(true, |sent| sent < run_on) => {
                n.last_sent_on = Some(run_on);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl StaffStore for MemoryStore {
    async fn list_wheel_items(&self) -> Result<Vec<WheelItem>, StoreError> {
        self.check_available().await?;
        Ok(self.state.lock().await.items.clone())
    }

    async fn create_wheel_item(
        &self,
        draft: &WheelItemDraft,
        now: DateTime<Utc>,
    ) -> Result<WheelItem, StoreError> {
        self.check_available().await?;
        let item = WheelItem {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            color: draft.color.clone(),
            weight: draft.weight,
            active: draft.active,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.items.push(item.clone());
        Ok(item)
    }

    async fn update_wheel_item(
        &self,
        id: Uuid,
        draft: &WheelItemDraft,
        now: DateTime<Utc>,
    ) -> Result<Option<WheelItem>, StoreError> {
        self.check_available().await?;
        let mut state = self.state.lock().await;
        Ok(state.items.iter_mut().find(|i| i.id == id).map(|item| {
            item.title = draft.title.clone();
            item.description = draft.description.clone();
            item.color = draft.color.clone();
            item.weight = draft.weight;
            item.active = draft.active;
            item.updated_at = now;
            item.clone()
        }))
    }

    async fn deactivate_wheel_item(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<WheelItem>, StoreError> {
        self.check_available().await?;
        let mut state = self.state.lock().await;
        Ok(state.items.iter_mut().find(|i| i.id == id).map(|item| {
            item.active = false;
            item.updated_at = now;
            item.clone()
        }))
    }

    async fn redeem_reward(&self, code: &str, now: DateTime<Utc>) -> Result<RedeemOutcome, StoreError> {
        self.check_available().await?;
        let mut state = self.state.lock().await;
        let Some(reward) = find_reward(&mut state, code) else {
            return Ok(RedeemOutcome::NotFound);
        };
        if reward.used {
            return Ok(RedeemOutcome::AlreadyUsed(reward.clone()));
        }
        if reward.expires_at <= now {
            return Ok(RedeemOutcome::Expired(reward.clone()));
        }
        reward.used = true;
        reward.used_at = Some(now);
        Ok(RedeemOutcome::Redeemed(reward.clone()))
    }

    async fn revoke_redemption(&self, code: &str) -> Result<Option<Reward>, StoreError> {
        self.check_available().await?;
        let mut state = self.state.lock().await;
        Ok(find_reward(&mut state, code).map(|reward| {
            reward.used = false;
            reward.used_at = None;
            reward.clone()
        }))
    }

    async fn create_notification(
        &self,
        message: &str,
        send_time: NaiveTime,
    ) -> Result<ScheduledNotification, StoreError> {
        self.check_available().await?;
        let notification = ScheduledNotification {
            id: Uuid::new_v4(),
            message: message.to_string(),
            send_time,
            active: true,
            last_sent_on: None,
            created_at: Utc::now(),
        };
        self.state.lock().await.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self) -> Result<Vec<ScheduledNotification>, StoreError> {
        self.check_available().await?;
        Ok(self.state.lock().await.notifications.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn store() -> MemoryStore {
        MemoryStore::new(StoreSettings {
            daily_spin_allowance: 3,
            timezone: chrono_tz::UTC,
        })
    }

    #[tokio::test]
    async fn test_reset_is_once_per_local_day() {
        let store = store();
        let a = store.insert_user(0, None).await;
        let b = store.insert_user(1, None).await;
        let gone = store.insert_user(0, None).await;
        store.deactivate_user(gone).await;

        let first = utc("2025-06-14T00:00:01Z");
        assert_eq!(store.reset_all_daily_spins(first).await.unwrap(), 2);
        assert_eq!(store.user(a).await.unwrap().spins_remaining, 3);
        assert_eq!(store.user(b).await.unwrap().spins_remaining, 3);
        assert_eq!(store.user(gone).await.unwrap().spins_remaining, 0);

        assert_eq!(store.reset_all_daily_spins(utc("2025-06-14T18:00:00Z")).await.unwrap(), 0);
        assert_eq!(store.reset_all_daily_spins(utc("2025-06-15T00:00:00Z")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_redeem_classifies_codes() {
        let store = store();
        let user_id = store.insert_user(1, None).await;
        let now = utc("2025-06-14T12:00:00Z");
        let reward = |code: &str, expires_at: &str| Reward {
            id: Uuid::new_v4(),
            code: code.to_string(),
            user_id,
            wheel_item_id: Uuid::new_v4(),
            item_title: "Cookie".to_string(),
            item_description: None,
            item_color: "#00FF00".to_string(),
            created_at: utc("2025-06-14T08:00:00Z"),
            expires_at: utc(expires_at),
            used: false,
            used_at: None,
        };
        store.insert_reward(reward("FRESH001", "2025-06-15T00:00:00Z")).await;
        store.insert_reward(reward("STALE001", "2025-06-14T11:00:00Z")).await;

        assert!(matches!(store.redeem_reward("FRESH001", now).await.unwrap(), RedeemOutcome::Redeemed(r) if r.used_at == Some(now)));
        assert!(matches!(store.redeem_reward("FRESH001", now).await.unwrap(), RedeemOutcome::AlreadyUsed(_)));
        assert!(matches!(store.redeem_reward("STALE001", now).await.unwrap(), RedeemOutcome::Expired(_)));
        assert_eq!(store.redeem_reward("NOPE0000", now).await.unwrap(), RedeemOutcome::NotFound);

        let revoked = store.revoke_redemption("FRESH001").await.unwrap().unwrap();
        assert!(!revoked.used);
        assert!(matches!(store.redeem_reward("FRESH001", now).await.unwrap(), RedeemOutcome::Redeemed(_)));
    }
}
