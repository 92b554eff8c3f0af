//! Password hashing (Argon2) and the password policy.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::borrow::Cow;
use uuid::Uuid;
use validator::ValidationError;

use crate::error::{AccountError, AccountResult};

/// Marks a hash that no password can match.
pub const UNUSABLE_PASSWORD_PREFIX: char = '!';

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

pub fn hash_password(password: &str) -> AccountResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::PasswordHash(e.to_string()))
}

/// `false` for a wrong password and for unusable hashes.
pub fn verify_password(password: &str, hash: &str) -> AccountResult<bool> {
    if !is_usable(hash) {
        return Ok(false);
    }

    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AccountError::PasswordHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash for accounts created without a password.
pub fn unusable_password() -> String {
    format!("{}{}", UNUSABLE_PASSWORD_PREFIX, Uuid::new_v4().simple())
}

pub fn is_usable(hash: &str) -> bool {
    !hash.is_empty() && !hash.starts_with(UNUSABLE_PASSWORD_PREFIX)
}

fn policy_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// 8-128 characters with an upper-case letter, a lower-case letter, a digit
/// and one of `!@#$%^&*()_+-=[]{}|;:,.<>?`.
pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();

    if length < 8 {
        return Err(policy_error(
            "password_too_short",
            "This password is too short. It must contain at least 8 characters.",
        ));
    }
    if length > 128 {
        return Err(policy_error(
            "password_too_long",
            "This password is too long. It must contain at most 128 characters.",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(policy_error(
            "password_no_upper",
            "The password must contain at least one uppercase letter.",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(policy_error(
            "password_no_lower",
            "The password must contain at least one lowercase letter.",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(policy_error(
            "password_no_digit",
            "The password must contain at least one digit.",
        ));
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(policy_error(
            "password_no_special",
            "The password must contain at least one special character.",
        ));
    }

    Ok(())
}
