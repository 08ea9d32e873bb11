use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::constants::{
    ALREADY_SPUN_TODAY_ERROR, INTERNAL_ERROR, NO_ACTIVE_ITEMS_ERROR, NO_SPINS_REMAINING_ERROR,
    STORAGE_ERROR, TIMEOUT_ERROR, UNAUTHENTICATED_ERROR, USER_NOT_FOUND_ERROR,
};
use shared::shared_wheel_game::{ApiErrorBody, RewardView};
use thiserror::Error;

use crate::auth::AuthError;
use crate::spin::SpinError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("user row kept changing across {0} attempts")]
    Contention(u32),
}

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Spin(#[from] SpinError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("malformed reward code")]
    InvalidRewardCode,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("reward {0} was already redeemed")]
    RewardAlreadyUsed(String),

    #[error("reward {0} has expired")]
    RewardExpired(String),
}

struct ErrorResponse {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
    recheck_status: bool,
    current_reward: Option<RewardView>,
}

impl ErrorResponse {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retryable: false,
            recheck_status: false,
            current_reward: None,
        }
    }

    fn retryable(mut self) -> Self {
        self.retryable = true;
        self.recheck_status = true;
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            code: self.code.to_string(),
            retryable: self.retryable,
            recheck_status: self.recheck_status,
            current_reward: self.current_reward,
        };
        (self.status, Json(body)).into_response()
    }
}

fn spin_error_response(err: SpinError) -> ErrorResponse {
    match err {
        SpinError::Unauthenticated => {
            ErrorResponse::new(StatusCode::UNAUTHORIZED, "unauthenticated", UNAUTHENTICATED_ERROR)
        }
        SpinError::UserNotFound(_) => {
            ErrorResponse::new(StatusCode::NOT_FOUND, "user_not_found", USER_NOT_FOUND_ERROR)
        }
        SpinError::NoSpinsRemaining { current_reward } => ErrorResponse {
            current_reward,
            ..ErrorResponse::new(StatusCode::CONFLICT, "no_spins_remaining", NO_SPINS_REMAINING_ERROR)
        },
        SpinError::AlreadySpunToday { current_reward } => ErrorResponse {
            current_reward,
            ..ErrorResponse::new(StatusCode::CONFLICT, "already_spun_today", ALREADY_SPUN_TODAY_ERROR)
        },
        SpinError::NoActiveItems => {
            ErrorResponse::new(StatusCode::SERVICE_UNAVAILABLE, "no_active_items", NO_ACTIVE_ITEMS_ERROR)
                .retryable()
        }
        SpinError::Timeout(_) => {
            ErrorResponse::new(StatusCode::GATEWAY_TIMEOUT, "timeout", TIMEOUT_ERROR).retryable()
        }
        SpinError::StorageFailure(_) => {
            ErrorResponse::new(StatusCode::SERVICE_UNAVAILABLE, "storage_failure", STORAGE_ERROR)
                .retryable()
        }
        SpinError::InvariantViolation(_) => {
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", INTERNAL_ERROR)
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let response = match self {
            Error::Spin(err) => spin_error_response(err),
            Error::Store(err) => {
                tracing::error!("Storage error: {}", err);
                ErrorResponse::new(StatusCode::SERVICE_UNAVAILABLE, "storage_failure", STORAGE_ERROR)
                    .retryable()
            }
            Error::Auth(err) => ErrorResponse::new(StatusCode::UNAUTHORIZED, err.code(), err.to_string()),
            Error::Validation(errors) => ErrorResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_failed",
                errors.to_string(),
            ),
            Error::InvalidRewardCode => ErrorResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_reward_code",
                "Reward codes are 8 letters or digits",
            ),
            Error::NotFound(what) => {
                ErrorResponse::new(StatusCode::NOT_FOUND, "not_found", format!("{} not found", what))
            }
            Error::RewardAlreadyUsed(code) => ErrorResponse::new(
                StatusCode::CONFLICT,
                "reward_already_used",
                format!("Reward {} was already redeemed", code),
            ),
            Error::RewardExpired(code) => ErrorResponse::new(
                StatusCode::GONE,
                "reward_expired",
                format!("Reward {} has expired", code),
            ),
        };
        response.into_response()
    }
}
