use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validation::validate_hex_color;

/// What a user gets to see about an issued reward.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RewardView {
    pub code: String,
    pub item_title: String,
    pub item_description: Option<String>,
    pub item_color: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a spin was refused.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoSpinsRemaining,
    AlreadySpunToday,
}

// === API Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct WheelSpinResponse {
    pub reward: RewardView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WheelStatusResponse {
    pub can_spin: bool,
    pub denial: Option<DenialReason>,
    pub spins_remaining: i32,
    pub next_reset_at: DateTime<Utc>,
    pub current_reward: Option<RewardView>,
}

/// A wheel slot as rendered by the client. Weights stay on the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WheelSegment {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: String,
    pub retryable: bool,
    pub recheck_status: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_reward: Option<RewardView>,
}

// === Staff API Types ===

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct WheelItemRequest {
    #[validate(length(min = 1, max = 80))]
    pub title: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(custom = "validate_hex_color")]
    pub color: String,
    #[validate(range(min = 0.0))]
    pub weight: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WheelItemAdminView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub color: String,
    pub weight: f64,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedeemRewardRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RedeemedRewardView {
    pub code: String,
    pub user_id: Uuid,
    pub item_title: String,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ScheduleNotificationRequest {
    #[validate(length(min = 1, max = 320))]
    pub message: String,
    /// Local wall-clock time, `HH:MM`.
    #[serde(with = "hh_mm")]
    pub send_time: NaiveTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScheduledNotificationView {
    pub id: Uuid,
    pub message: String,
    #[serde(with = "hh_mm")]
    pub send_time: NaiveTime,
    pub active: bool,
    pub last_sent_on: Option<chrono::NaiveDate>,
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}
