use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use shared::shared_wheel_game::{
    RedeemedRewardView, RewardView, ScheduledNotificationView, WheelItemAdminView,
    WheelItemRequest, WheelSegment,
};
use uuid::Uuid;

/// A prize slot on the wheel. `weight` is relative, not a probability.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WheelItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub color: String,
    pub weight: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WheelItem {
    pub fn segment(&self) -> WheelSegment {
        WheelSegment {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            color: self.color.clone(),
        }
    }

    pub fn admin_view(&self) -> WheelItemAdminView {
        WheelItemAdminView {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            color: self.color.clone(),
            weight: self.weight,
            active: self.active,
            updated_at: self.updated_at,
        }
    }
}

/// Validated staff input for creating or replacing a wheel item.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelItemDraft {
    pub title: String,
    pub description: Option<String>,
    pub color: String,
    pub weight: f64,
    pub active: bool,
}

impl From<WheelItemRequest> for WheelItemDraft {
    fn from(request: WheelItemRequest) -> Self {
        Self {
            title: request.title.trim().to_string(),
            description: request
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            color: request.color.to_ascii_uppercase(),
            weight: request.weight,
            active: request.active,
        }
    }
}

/// The slice of a user record the wheel cares about.
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub spins_remaining: i32,
    pub last_spin_at: Option<DateTime<Utc>>,
}

/// An issued prize. Item fields are copied at issuance so later edits to the
/// wheel item don't rewrite history.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Reward {
    pub id: Uuid,
    pub code: String,
    pub user_id: Uuid,
    pub wheel_item_id: Uuid,
    pub item_title: String,
    pub item_description: Option<String>,
    pub item_color: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl Reward {
    pub fn view(&self) -> RewardView {
        RewardView {
            code: self.code.clone(),
            item_title: self.item_title.clone(),
            item_description: self.item_description.clone(),
            item_color: self.item_color.clone(),
            expires_at: self.expires_at,
        }
    }

    pub fn redemption_view(&self) -> RedeemedRewardView {
        RedeemedRewardView {
            code: self.code.clone(),
            user_id: self.user_id,
            item_title: self.item_title.clone(),
            used: self.used,
            used_at: self.used_at,
            expires_at: self.expires_at,
        }
    }
}

/// Result of a staff redemption attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RedeemOutcome {
    Redeemed(Reward),
    AlreadyUsed(Reward),
    Expired(Reward),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub message: String,
    /// Local wall-clock time in the wheel's time zone.
    pub send_time: NaiveTime,
    pub active: bool,
    pub last_sent_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledNotification {
    pub fn view(&self) -> ScheduledNotificationView {
        ScheduledNotificationView {
            id: self.id,
            message: self.message.clone(),
            send_time: self.send_time,
            active: self.active,
            last_sent_on: self.last_sent_on,
        }
    }
}

/// A reminder that is due, together with who should receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub notification_id: Uuid,
    pub body: String,
    pub recipients: Vec<String>,
}
