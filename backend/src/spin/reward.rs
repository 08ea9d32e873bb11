use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::Rng;
use shared::constants::{REWARD_CODE_ALPHABET, REWARD_CODE_LENGTH};
use uuid::Uuid;

use crate::clock::next_local_midnight;
use crate::models::{Reward, WheelItem};

/// Builds reward values. Uniqueness of the code is checked by storage at
/// commit time; on a collision the caller asks for a fresh reward.
#[derive(Debug, Clone)]
pub struct RewardIssuer {
    timezone: Tz,
    code_length: usize,
}

impl RewardIssuer {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            code_length: REWARD_CODE_LENGTH,
        }
    }

    /// The reward is valid until the next local midnight after `now`, so a
    /// spin at 23:59 is only good for a minute.
    pub fn issue<R: Rng + ?Sized>(
        &self,
        user_id: Uuid,
        item: &WheelItem,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Reward {
        Reward {
            id: Uuid::new_v4(),
            code: generate_code(rng, self.code_length),
            user_id,
            wheel_item_id: item.id,
            item_title: item.title.clone(),
            item_description: item.description.clone(),
            item_color: item.color.clone(),
            created_at: now,
            expires_at: next_local_midnight(now, self.timezone),
            used: false,
            used_at: None,
        }
    }
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| REWARD_CODE_ALPHABET[rng.gen_range(0..REWARD_CODE_ALPHABET.len())] as char)
        .collect()
}
