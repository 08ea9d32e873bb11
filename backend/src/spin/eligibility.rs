use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use shared::shared_wheel_game::DenialReason;

use crate::clock::local_date;
use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Denied(DenialReason),
}

/// Decides whether `user` may spin at `now`.
///
/// The counter and the last-spin date are both checked even though a
/// committed spin moves them together: the reset job writes the counter on
/// its own schedule, so the date alone decides "already spun today" and the
/// counter alone decides "has spins left". When both fail the date wins.
/// A `last_spin_at` ahead of `now` (clock skew) counts as today.
pub fn can_spin(user: &User, now: DateTime<Utc>, timezone: Tz) -> Eligibility {
    let today = local_date(now, timezone);
    let spun_today = user
        .last_spin_at
        .map(|last| local_date(last, timezone) >= today)
        .unwrap_or(false);
    let out_of_spins = user.spins_remaining <= 0;

    if spun_today {
        Eligibility::Denied(DenialReason::AlreadySpunToday)
    } else if out_of_spins {
        Eligibility::Denied(DenialReason::NoSpinsRemaining)
    } else {
        Eligibility::Allowed
    }
}
