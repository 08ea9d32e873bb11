use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

use crate::constants::{REWARD_CODE_ALPHABET, REWARD_CODE_LENGTH};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    if !HEX_COLOR.is_match(color) {
        return Err(ValidationError::new("invalid_hex_color"));
    }
    Ok(())
}

/// Staff type codes by hand, so accept lowercase and stray whitespace.
pub fn normalize_reward_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn validate_reward_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != REWARD_CODE_LENGTH
        || !code.bytes().all(|b| REWARD_CODE_ALPHABET.contains(&b))
    {
        return Err(ValidationError::new("invalid_reward_code"));
    }
    Ok(())
}
