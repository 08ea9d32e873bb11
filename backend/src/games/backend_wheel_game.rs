use axum::{
    debug_handler,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use shared::shared_wheel_game::*;
use tracing::debug;
use uuid::Uuid;

use crate::auth::middleware::UserId;
use crate::auth::AuthError;
use crate::error::Error;
use crate::spin::SpinRequest;
use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/spin", post(spin_wheel))
        .route("/status", get(wheel_status))
        .route("/items", get(wheel_items))
}

/// Missing or bad credentials become an anonymous caller; the coordinator
/// turns that into its own rejection.
fn caller(user: Result<UserId, AuthError>) -> Option<Uuid> {
    match user {
        Ok(UserId(id)) => Some(id),
        Err(e) => {
            debug!("Anonymous wheel request: {}", e);
            None
        }
    }
}

#[debug_handler]
async fn spin_wheel(
    State(state): State<AppState>,
    user: Result<UserId, AuthError>,
) -> Result<Json<WheelSpinResponse>, Error> {
    let request = SpinRequest {
        caller: caller(user),
        requested_at: Utc::now(),
    };
    let reward = state.coordinator.spin(request).await?;
    Ok(Json(WheelSpinResponse { reward }))
}

#[debug_handler]
async fn wheel_status(
    State(state): State<AppState>,
    user: Result<UserId, AuthError>,
) -> Result<Json<WheelStatusResponse>, Error> {
    let status = state.coordinator.status(caller(user), Utc::now()).await?;
    Ok(Json(status))
}

async fn wheel_items(State(state): State<AppState>) -> Result<Json<Vec<WheelSegment>>, Error> {
    Ok(Json(state.coordinator.wheel_segments().await?))
}
