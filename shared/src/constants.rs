pub const STAFF_SECRET_HEADER: &str = "x-staff-secret";

/// Characters a reward code is drawn from: digits then uppercase letters.
pub const REWARD_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const REWARD_CODE_LENGTH: usize = 8;

pub const DEFAULT_DAILY_SPIN_ALLOWANCE: i32 = 1;

pub const UNAUTHENTICATED_ERROR: &str = "Please sign in to spin the wheel";
pub const USER_NOT_FOUND_ERROR: &str = "Account not found";
pub const NO_SPINS_REMAINING_ERROR: &str = "You have no spins left today";
pub const ALREADY_SPUN_TODAY_ERROR: &str = "You have already spun the wheel today. Come back tomorrow!";
pub const NO_ACTIVE_ITEMS_ERROR: &str = "The wheel is not available right now. Please try again later";
pub const TIMEOUT_ERROR: &str = "We could not confirm your spin. Please check your status before trying again";
pub const STORAGE_ERROR: &str = "Something went wrong. Please check your status before trying again";
pub const INTERNAL_ERROR: &str = "Something went wrong on our side";
