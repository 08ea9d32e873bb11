use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::Rng;
use shared::shared_wheel_game::{RewardView, WheelSegment, WheelStatusResponse};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::eligibility::{can_spin, Eligibility};
use super::reward::RewardIssuer;
use super::selector::pick;
use super::{ErrorClass, SpinError};
use crate::clock::{next_local_midnight, start_of_day_containing};
use crate::config::AppConfig;
use crate::error::StoreError;
use crate::models::{Reward, WheelItem};
use crate::services::{CommitOutcome, ExpectedPriorState, SpinStore};

const MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct SpinSettings {
    pub timezone: Tz,
    /// Upper bound for every single storage call.
    pub storage_timeout: Duration,
    /// Fresh codes tried when the generated one already exists.
    pub max_code_attempts: u32,
    /// Re-reads allowed when the user row changes under a commit.
    pub max_conflict_retries: u32,
}

impl From<&AppConfig> for SpinSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            timezone: config.timezone,
            storage_timeout: config.storage_timeout,
            max_code_attempts: config.max_code_attempts,
            max_conflict_retries: MAX_CONFLICT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpinRequest {
    /// `None` when the request carried no valid identity.
    pub caller: Option<Uuid>,
    pub requested_at: DateTime<Utc>,
}

enum Attempt {
    Won(Reward),
    Conflict,
}

pub struct SpinCoordinator {
    store: Arc<dyn SpinStore>,
    issuer: RewardIssuer,
    settings: SpinSettings,
}

impl SpinCoordinator {
    pub fn new(store: Arc<dyn SpinStore>, settings: SpinSettings) -> Self {
        Self {
            store,
            issuer: RewardIssuer::new(settings.timezone),
            settings,
        }
    }

    /// Resolves one spin end to end. On success the reward is stored and the
    /// user's allowance debited; on any error neither happened.
    pub async fn spin(&self, request: SpinRequest) -> Result<RewardView, SpinError> {
        match self.resolve(request).await {
            Ok(reward) => {
                info!(
                    "🎡 WHEEL SPIN: user {} won '{}' (code {}, expires {})",
                    reward.user_id, reward.item_title, reward.code, reward.expires_at
                );
                Ok(reward.view())
            }
            Err(err) => {
                let caller = request
                    .caller
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "anonymous".to_string());
                match err.class() {
                    ErrorClass::Rejection => debug!(
                        reason = ?err.denial(),
                        "Spin rejected for {}: {} (unused reward on file: {})",
                        caller,
                        err,
                        err.current_reward().is_some()
                    ),
                    ErrorClass::Failure => error!("Spin failed for {}: {}", caller, err),
                    ErrorClass::InvariantViolation => {
                        error!("🚨 Spin for {} hit a data problem: {}", caller, err)
                    }
                }
                Err(err)
            }
        }
    }

    async fn resolve(&self, request: SpinRequest) -> Result<Reward, SpinError> {
        let user_id = request.caller.ok_or(SpinError::Unauthenticated)?;
        let now = request.requested_at;
        let timezone = self.settings.timezone;
        let day_started_at = start_of_day_containing(now, timezone);

        let mut conflicts = 0;
        loop {
            let user = self
                .bounded(self.store.load_user(user_id))
                .await?
                .ok_or(SpinError::UserNotFound(user_id))?;

            if let Eligibility::Denied(reason) = can_spin(&user, now, timezone) {
                let current_reward = self.current_reward_or_none(user_id, now).await;
                return Err(SpinError::denied(reason, current_reward));
            }

            let items = self.bounded(self.store.load_active_wheel_items()).await?;
            if items.is_empty() {
                return Err(SpinError::NoActiveItems);
            }

            let expected = ExpectedPriorState::of(&user, day_started_at);
            match self.draw_and_commit(user_id, &items, now, &expected).await? {
                Attempt::Won(reward) => return Ok(reward),
                Attempt::Conflict => {
                    conflicts += 1;
                    if conflicts > self.settings.max_conflict_retries {
                        return Err(StoreError::Contention(conflicts).into());
                    }
                    debug!("User {} changed during spin, re-reading ({})", user_id, conflicts);
                }
            }
        }
    }

    async fn draw_and_commit(
        &self,
        user_id: Uuid,
        items: &[WheelItem],
        now: DateTime<Utc>,
        expected: &ExpectedPriorState,
    ) -> Result<Attempt, SpinError> {
        let weighted: Vec<(&WheelItem, f64)> = items.iter().map(|item| (item, item.weight)).collect();
        let prize = {
            let mut rng = rand::thread_rng();
            pick(&weighted, || rng.gen::<f64>()).map_err(|e| {
                SpinError::InvariantViolation(format!("active wheel items cannot be drawn: {}", e))
            })?
        };

        for attempt in 1..=self.settings.max_code_attempts {
            let reward = self.issuer.issue(user_id, prize, now, &mut rand::thread_rng());
            match self
                .bounded(self.store.commit_spin(user_id, &reward, expected))
                .await?
            {
                CommitOutcome::Committed => return Ok(Attempt::Won(reward)),
                CommitOutcome::Conflict => return Ok(Attempt::Conflict),
                CommitOutcome::DuplicateCode => {
                    warn!("Reward code collision on attempt {}, issuing a new code", attempt);
                }
            }
        }

        Err(SpinError::InvariantViolation(format!(
            "{} consecutive reward code collisions",
            self.settings.max_code_attempts
        )))
    }

    /// The caller's latest redeemable reward, for display next to a
    /// rejection. A failed lookup only loses the hint.
    async fn current_reward_or_none(&self, user_id: Uuid, now: DateTime<Utc>) -> Option<RewardView> {
        match self
            .bounded(self.store.find_most_recent_unused_reward(user_id, now))
            .await
        {
            Ok(reward) => reward.map(|r| r.view()),
            Err(e) => {
                warn!("Could not load current reward for {}: {}", user_id, e);
                None
            }
        }
    }

    pub async fn status(
        &self,
        caller: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<WheelStatusResponse, SpinError> {
        let user_id = caller.ok_or(SpinError::Unauthenticated)?;
        let user = self
            .bounded(self.store.load_user(user_id))
            .await?
            .ok_or(SpinError::UserNotFound(user_id))?;
        let current_reward = self
            .bounded(self.store.find_most_recent_unused_reward(user_id, now))
            .await?
            .map(|r| r.view());

        let denial = match can_spin(&user, now, self.settings.timezone) {
            Eligibility::Allowed => None,
            Eligibility::Denied(reason) => Some(reason),
        };

        Ok(WheelStatusResponse {
            can_spin: denial.is_none(),
            denial,
            spins_remaining: user.spins_remaining.max(0),
            next_reset_at: next_local_midnight(now, self.settings.timezone),
            current_reward,
        })
    }

    pub async fn wheel_segments(&self) -> Result<Vec<WheelSegment>, SpinError> {
        let items = self.bounded(self.store.load_active_wheel_items()).await?;
        Ok(items.iter().map(WheelItem::segment).collect())
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, SpinError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.settings.storage_timeout, call).await {
            Ok(result) => result.map_err(SpinError::from),
            Err(_) => Err(SpinError::Timeout(self.settings.storage_timeout)),
        }
    }
}
