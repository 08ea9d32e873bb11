use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use shared::constants::STAFF_SECRET_HEADER;
use uuid::Uuid;

use super::{validate_jwt, AuthError};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for UserId {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AuthError::MissingToken)?;

        let user_id = validate_jwt(token, &state.config.jwt_secret)?;
        Ok(UserId(user_id))
    }
}

pub async fn require_staff(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let provided = request
        .headers()
        .get(STAFF_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !secrets_match(provided.as_bytes(), state.config.staff_secret.as_bytes()) {
        tracing::warn!("rejected staff request to {}", request.uri().path());
        return Err(AuthError::InvalidStaffSecret);
    }

    Ok(next.run(request).await)
}

fn secrets_match(provided: &[u8], expected: &[u8]) -> bool {
    provided.len() == expected.len()
        && provided
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}
