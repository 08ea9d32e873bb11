//! Staff back-office routes: wheel configuration, counter redemption and
//! reminder scheduling. Mounted under `/admin` behind the staff secret.

use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use shared::shared_wheel_game::{
    RedeemRewardRequest, RedeemedRewardView, ScheduleNotificationRequest,
    ScheduledNotificationView, WheelItemAdminView, WheelItemRequest,
};
use shared::validation::{normalize_reward_code, validate_reward_code};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::require_staff;
use crate::error::Error;
use crate::models::{RedeemOutcome, WheelItem, WheelItemDraft};
use crate::AppState;

pub fn create_staff_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/wheel-items", get(list_wheel_items).post(create_wheel_item))
        .route("/wheel-items/:id", put(update_wheel_item))
        .route("/wheel-items/:id/deactivate", post(deactivate_wheel_item))
        .route("/rewards/redeem", post(redeem_reward))
        .route("/rewards/:code/revoke", post(revoke_redemption))
        .route("/notifications", get(list_notifications).post(create_notification))
        .layer(middleware::from_fn_with_state(state, require_staff))
}

pub async fn list_wheel_items(
    State(state): State<AppState>,
) -> Result<Json<Vec<WheelItemAdminView>>, Error> {
    let items = state.staff.list_wheel_items().await?;
    Ok(Json(items.iter().map(WheelItem::admin_view).collect()))
}

pub async fn create_wheel_item(
    State(state): State<AppState>,
    Json(request): Json<WheelItemRequest>,
) -> Result<Json<WheelItemAdminView>, Error> {
    request.validate()?;
    let draft = WheelItemDraft::from(request);
    let item = state.staff.create_wheel_item(&draft, Utc::now()).await?;
    info!("🎡 Wheel item '{}' created with weight {}", item.title, item.weight);
    Ok(Json(item.admin_view()))
}

pub async fn update_wheel_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<WheelItemRequest>,
) -> Result<Json<WheelItemAdminView>, Error> {
    request.validate()?;
    let draft = WheelItemDraft::from(request);
    let item = state
        .staff
        .update_wheel_item(id, &draft, Utc::now())
        .await?
        .ok_or(Error::NotFound("wheel item"))?;
    info!("🎡 Wheel item {} updated", item.id);
    Ok(Json(item.admin_view()))
}

pub async fn deactivate_wheel_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WheelItemAdminView>, Error> {
    let item = state
        .staff
        .deactivate_wheel_item(id, Utc::now())
        .await?
        .ok_or(Error::NotFound("wheel item"))?;
    info!("🎡 Wheel item {} deactivated", item.id);
    Ok(Json(item.admin_view()))
}

pub async fn redeem_reward(
    State(state): State<AppState>,
    Json(request): Json<RedeemRewardRequest>,
) -> Result<Json<RedeemedRewardView>, Error> {
    let code = normalize_reward_code(&request.code);
    validate_reward_code(&code).map_err(|_| Error::InvalidRewardCode)?;

    match state.staff.redeem_reward(&code, Utc::now()).await? {
        RedeemOutcome::Redeemed(reward) => {
            info!("🎁 Reward {} redeemed for user {}", reward.code, reward.user_id);
            Ok(Json(reward.redemption_view()))
        }
        RedeemOutcome::AlreadyUsed(_) => Err(Error::RewardAlreadyUsed(code)),
        RedeemOutcome::Expired(_) => Err(Error::RewardExpired(code)),
        RedeemOutcome::NotFound => Err(Error::NotFound("reward")),
    }
}

pub async fn revoke_redemption(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RedeemedRewardView>, Error> {
    let code = normalize_reward_code(&code);
    validate_reward_code(&code).map_err(|_| Error::InvalidRewardCode)?;

    let reward = state
        .staff
        .revoke_redemption(&code)
        .await?
        .ok_or(Error::NotFound("reward"))?;
    info!("Redemption of reward {} revoked by staff", reward.code);
    Ok(Json(reward.redemption_view()))
}

pub async fn list_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduledNotificationView>>, Error> {
    let notifications = state.staff.list_notifications().await?;
    Ok(Json(notifications.iter().map(|n| n.view()).collect()))
}

pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<ScheduleNotificationRequest>,
) -> Result<Json<ScheduledNotificationView>, Error> {
    request.validate()?;
    let notification = state
        .staff
        .create_notification(request.message.trim(), request.send_time)
        .await?;
    info!(
        "📨 Reminder scheduled daily at {}",
        notification.send_time.format("%H:%M")
    );
    Ok(Json(notification.view()))
}
