use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use tracing::{error, trace};
use uuid::Uuid;

use super::{
    CommitOutcome, ExpectedPriorState, MaintenanceStore, SpinStore, StaffStore, StoreSettings,
};
use crate::clock::start_of_day_containing;
use crate::error::StoreError;
use crate::models::{
    PendingMessage, RedeemOutcome, Reward, ScheduledNotification, User, WheelItem, WheelItemDraft,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    settings: StoreSettings,
}

impl PgStore {
    pub fn new(pool: PgPool, settings: StoreSettings) -> Self {
        Self { pool, settings }
    }
}

#[async_trait]
impl SpinStore for PgStore {
    async fn load_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, spins_remaining, last_spin_at FROM users WHERE id = $1 AND is_active",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn load_active_wheel_items(&self) -> Result<Vec<WheelItem>, StoreError> {
        let items = sqlx::query_as::<_, WheelItem>(
            "SELECT * FROM wheel_items WHERE active ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn commit_spin(
        &self,
        user_id: Uuid,
        reward: &Reward,
        expected: &ExpectedPriorState,
    ) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query(
            r#"
            UPDATE users
            SET spins_remaining = spins_remaining - 1,
                last_spin_at = $2
            WHERE id = $1
              AND is_active
              AND spins_remaining = $3
              AND spins_remaining > 0
              AND last_spin_at IS NOT DISTINCT FROM $4
              AND (last_spin_at IS NULL OR last_spin_at < $5)
            "#,
        )
        .bind(user_id)
        .bind(reward.created_at)
        .bind(expected.spins_remaining)
        .bind(expected.last_spin_at)
        .bind(expected.day_started_at)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CommitOutcome::Conflict);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO rewards (
                id, code, user_id, wheel_item_id, item_title, item_description,
                item_color, created_at, expires_at, used, used_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, NULL)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(reward.id)
        .bind(&reward.code)
        .bind(reward.user_id)
        .bind(reward.wheel_item_id)
        .bind(&reward.item_title)
        .bind(&reward.item_description)
        .bind(&reward.item_color)
        .bind(reward.created_at)
        .bind(reward.expires_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CommitOutcome::DuplicateCode);
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit spin for user {}: {}", user_id, e);
            e
        })?;
        trace!("Committed reward {} for user {}", reward.code, user_id);
        Ok(CommitOutcome::Committed)
    }

    async fn find_most_recent_unused_reward(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Reward>, StoreError> {
        let reward = sqlx::query_as::<_, Reward>(
            r#"
            SELECT * FROM rewards
            WHERE user_id = $1 AND NOT used AND expires_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reward)
    }
}

#[async_trait]
impl MaintenanceStore for PgStore {
    async fn reset_all_daily_spins(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let day_started_at = start_of_day_containing(now, self.settings.timezone);
        let result = sqlx::query(
            r#"
            UPDATE users
            SET spins_remaining = $1,
                spins_reset_at = $2
            WHERE is_active
              AND (spins_reset_at IS NULL OR spins_reset_at < $3)
            "#,
        )
        .bind(self.settings.daily_spin_allowance)
        .bind(now)
        .bind(day_started_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn due_notifications(&self, now: DateTime<Utc>) -> Result<Vec<PendingMessage>, StoreError> {
        let local_now = now.with_timezone(&self.settings.timezone);
        let due = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT * FROM scheduled_notifications
            WHERE active
              AND send_time <= $1
              AND (last_sent_on IS NULL OR last_sent_on < $2)
            ORDER BY send_time, id
            "#,
        )
        .bind(local_now.time())
        .bind(local_now.date_naive())
        .fetch_all(&self.pool)
        .await?;

        if due.is_empty() {
            return Ok(Vec::new());
        }

        let recipients: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT phone FROM users
            WHERE is_active
              AND phone IS NOT NULL
              AND (last_spin_at IS NULL OR last_spin_at < $1)
            ORDER BY phone
            "#,
        )
        .bind(start_of_day_containing(now, self.settings.timezone))
        .fetch_all(&self.pool)
        .await?;

        Ok(due
            .into_iter()
            .map(|n| PendingMessage {
                notification_id: n.id,
                body: n.message,
                recipients: recipients.clone(),
            })
            .collect())
    }

    async fn claim_notification_run(
        &self,
        notification_id: Uuid,
        run_on: NaiveDate,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_notifications
            SET last_sent_on = $2
            WHERE id = $1 AND (last_sent_on IS NULL OR last_sent_on < $2)
            "#,
        )
        .bind(notification_id)
        .bind(run_on)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl StaffStore for PgStore {
    async fn list_wheel_items(&self) -> Result<Vec<WheelItem>, StoreError> {
        let items = sqlx::query_as::<_, WheelItem>("SELECT * FROM wheel_items ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn create_wheel_item(
        &self,
        draft: &WheelItemDraft,
        now: DateTime<Utc>,
    ) -> Result<WheelItem, StoreError> {
        let item = sqlx::query_as::<_, WheelItem>(
            r#"
            INSERT INTO wheel_items (id, title, description, color, weight, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.color)
        .bind(draft.weight)
        .bind(draft.active)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }

    async fn update_wheel_item(
        &self,
        id: Uuid,
        draft: &WheelItemDraft,
        now: DateTime<Utc>,
    ) -> Result<Option<WheelItem>, StoreError> {
        let item = sqlx::query_as::<_, WheelItem>(
            r#"
            UPDATE wheel_items
            SET title = $2, description = $3, color = $4, weight = $5, active = $6, updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.color)
        .bind(draft.weight)
        .bind(draft.active)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn deactivate_wheel_item(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<WheelItem>, StoreError> {
        let item = sqlx::query_as::<_, WheelItem>(
            "UPDATE wheel_items SET active = FALSE, updated_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn redeem_reward(&self, code: &str, now: DateTime<Utc>) -> Result<RedeemOutcome, StoreError> {
        // Mark first so two counters can't redeem the same code.
        let redeemed = sqlx::query_as::<_, Reward>(
            r#"
            UPDATE rewards
            SET used = TRUE, used_at = $2
            WHERE code = $1 AND NOT used AND expires_at > $2
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(reward) = redeemed {
            return Ok(RedeemOutcome::Redeemed(reward));
        }

        let existing = sqlx::query_as::<_, Reward>("SELECT * FROM rewards WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match existing {
            None => RedeemOutcome::NotFound,
            Some(reward) if reward.used => RedeemOutcome::AlreadyUsed(reward),
            Some(reward) => RedeemOutcome::Expired(reward),
        })
    }

    async fn revoke_redemption(&self, code: &str) -> Result<Option<Reward>, StoreError> {
        let reward = sqlx::query_as::<_, Reward>(
            "UPDATE rewards SET used = FALSE, used_at = NULL WHERE code = $1 RETURNING *",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reward)
    }

    async fn create_notification(
        &self,
        message: &str,
        send_time: NaiveTime,
    ) -> Result<ScheduledNotification, StoreError> {
        let notification = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            INSERT INTO scheduled_notifications (id, message, send_time, active, created_at)
            VALUES ($1, $2, $3, TRUE, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message)
        .bind(send_time)
        .fetch_one(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn list_notifications(&self) -> Result<Vec<ScheduledNotification>, StoreError> {
        let notifications = sqlx::query_as::<_, ScheduledNotification>(
            "SELECT * FROM scheduled_notifications ORDER BY send_time, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }
}
