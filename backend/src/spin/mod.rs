//! The spin resolution engine: who may spin, what they win, and the single
//! atomic write that makes a spin count.

use std::time::Duration;

use shared::shared_wheel_game::{DenialReason, RewardView};
use thiserror::Error;
use uuid::Uuid;

use crate::error::StoreError;

pub mod coordinator;
pub mod eligibility;
pub mod reward;
pub mod selector;

pub use coordinator::{SpinCoordinator, SpinRequest, SpinSettings};

/// How an error should be treated by operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected business outcome; not an error in the logs.
    Rejection,
    /// Infrastructure trouble; retryable once the client re-checks status.
    Failure,
    /// Data-integrity bug upstream; needs an operator.
    InvariantViolation,
}

#[derive(Debug, Error)]
pub enum SpinError {
    #[error("caller is not authenticated")]
    Unauthenticated,

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("no spins remaining")]
    NoSpinsRemaining { current_reward: Option<RewardView> },

    #[error("already spun today")]
    AlreadySpunToday { current_reward: Option<RewardView> },

    #[error("no active wheel items are configured")]
    NoActiveItems,

    #[error("storage did not answer within {0:?}")]
    Timeout(Duration),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl SpinError {
    pub fn denied(reason: DenialReason, current_reward: Option<RewardView>) -> Self {
        match reason {
            DenialReason::NoSpinsRemaining => Self::NoSpinsRemaining { current_reward },
            DenialReason::AlreadySpunToday => Self::AlreadySpunToday { current_reward },
        }
    }

    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            Self::NoSpinsRemaining { .. } => Some(DenialReason::NoSpinsRemaining),
            Self::AlreadySpunToday { .. } => Some(DenialReason::AlreadySpunToday),
            _ => None,
        }
    }

    pub fn current_reward(&self) -> Option<&RewardView> {
        match self {
            Self::NoSpinsRemaining { current_reward } | Self::AlreadySpunToday { current_reward } => {
                current_reward.as_ref()
            }
            _ => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unauthenticated
            | Self::UserNotFound(_)
            | Self::NoSpinsRemaining { .. }
            | Self::AlreadySpunToday { .. } => ErrorClass::Rejection,
            Self::NoActiveItems | Self::Timeout(_) | Self::StorageFailure(_) => ErrorClass::Failure,
            Self::InvariantViolation(_) => ErrorClass::InvariantViolation,
        }
    }
}
