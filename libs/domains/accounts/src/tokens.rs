//! Signed, expiring keys for e-mail confirmation and password reset.
//!
//! Both are HS256 tokens signed with the service secret through
//! [`JwtAuth::sign`]. A `purpose` claim keeps one kind from being accepted
//! as the other, and neither decodes as an access or refresh token.
//!
//! Reset tokens carry a fingerprint of the user's password hash and last
//! login, so a token stops verifying once the password is changed or the
//! user logs in.

use axum_helpers::JwtAuth;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AccountError, AccountResult};
use crate::models::{EmailAddress, User};

pub const CONFIRMATION_KEY_TTL_DAYS: i64 = 3;
pub const RESET_TOKEN_TTL_DAYS: i64 = 1;

const EMAIL_CONFIRMATION: &str = "email_confirmation";
const PASSWORD_RESET: &str = "password_reset";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfirmationClaims {
    purpose: String,
    sub: Uuid,
    email: String,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResetClaims {
    purpose: String,
    sub: Uuid,
    fp: String,
    exp: i64,
    iat: i64,
}

/// Decoded e-mail confirmation key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationKey {
    pub email_address_id: Uuid,
    pub email: String,
}

#[derive(Clone)]
pub struct AccountTokens {
    jwt: JwtAuth,
}

impl AccountTokens {
    pub fn new(jwt: JwtAuth) -> Self {
        Self { jwt }
    }

    pub fn confirmation_key(&self, address: &EmailAddress) -> AccountResult<String> {
        let now = Utc::now();
        let claims = ConfirmationClaims {
            purpose: EMAIL_CONFIRMATION.to_string(),
            sub: address.id,
            email: address.email.clone(),
            exp: (now + Duration::days(CONFIRMATION_KEY_TTL_DAYS)).timestamp(),
            iat: now.timestamp(),
        };

        self.jwt
            .sign(&claims)
            .map_err(|e| AccountError::Internal(format!("Failed to sign confirmation key: {}", e)))
    }

    /// `None` for forged, expired or foreign keys.
    pub fn verify_confirmation_key(&self, key: &str) -> Option<ConfirmationKey> {
        let claims: ConfirmationClaims = self
            .jwt
            .decode(key)
            .inspect_err(|e| tracing::debug!("Confirmation key rejected: {}", e))
            .ok()?;

        (claims.purpose == EMAIL_CONFIRMATION).then(|| ConfirmationKey {
            email_address_id: claims.sub,
            email: claims.email,
        })
    }

    pub fn reset_token(&self, user: &User) -> AccountResult<String> {
        let now = Utc::now();
        let claims = ResetClaims {
            purpose: PASSWORD_RESET.to_string(),
            sub: user.id,
            fp: fingerprint(&user.password_hash, user.last_login),
            exp: (now + Duration::days(RESET_TOKEN_TTL_DAYS)).timestamp(),
            iat: now.timestamp(),
        };

        self.jwt
            .sign(&claims)
            .map_err(|e| AccountError::Internal(format!("Failed to sign reset token: {}", e)))
    }

    /// Valid, unexpired, issued for `user` and still matching its password.
    pub fn check_reset_token(&self, user: &User, token: &str) -> bool {
        let Ok(claims) = self.jwt.decode::<ResetClaims>(token) else {
            return false;
        };

        claims.purpose == PASSWORD_RESET
            && claims.sub == user.id
            && claims.fp == fingerprint(&user.password_hash, user.last_login)
    }
}

/// Opaque `uid` of a password reset link.
pub fn encode_uid(id: Uuid) -> String {
    id.simple().to_string()
}

pub fn decode_uid(uid: &str) -> Option<Uuid> {
    Uuid::parse_str(uid).ok()
}

fn fingerprint(password_hash: &str, last_login: Option<DateTime<Utc>>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password_hash.as_bytes());
    if let Some(login) = last_login {
        hasher.update(login.timestamp_micros().to_be_bytes());
    }
    const_hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_helpers::JwtConfig;

    fn tokens() -> AccountTokens {
        let config = JwtConfig::new("test-secret-that-is-long-enough-for-hs256").unwrap();
        AccountTokens::new(JwtAuth::in_memory(&config))
    }

    fn alice() -> User {
        let mut user = User::new();
        user.username = "alice".into();
        user.email = "alice@example.com".into();
        user.password_hash = "$argon2id$v=19$first".into();
        user
    }

    #[test]
    fn test_confirmation_key_round_trip() {
        let tokens = tokens();
        let address = EmailAddress::primary(&alice());

        let key = tokens.confirmation_key(&address).unwrap();
        let decoded = tokens.verify_confirmation_key(&key).unwrap();

        assert_eq!(decoded.email_address_id, address.id);
        assert_eq!(decoded.email, "alice@example.com");
    }

    #[test]
    fn test_reset_token_is_not_a_confirmation_key() {
        let tokens = tokens();
        let token = tokens.reset_token(&alice()).unwrap();

        assert!(tokens.verify_confirmation_key(&token).is_none());
        assert!(tokens.verify_confirmation_key("garbage").is_none());
    }

    #[test]
    fn test_reset_token_stops_working_after_password_change() {
        let tokens = tokens();
        let mut user = alice();
        let token = tokens.reset_token(&user).unwrap();

        assert!(tokens.check_reset_token(&user, &token));

        user.password_hash = "$argon2id$v=19$second".into();
        assert!(!tokens.check_reset_token(&user, &token));
    }

    #[test]
    fn test_reset_token_stops_working_after_login() {
        let tokens = tokens();
        let mut user = alice();
        let token = tokens.reset_token(&user).unwrap();

        user.last_login = Some(Utc::now());
        assert!(!tokens.check_reset_token(&user, &token));
    }

    #[test]
    fn test_reset_token_is_bound_to_user() {
        let tokens = tokens();
        let token = tokens.reset_token(&alice()).unwrap();

        assert!(!tokens.check_reset_token(&alice(), &token));
    }

    #[test]
    fn test_uid_round_trip() {
        let id = Uuid::now_v7();
        assert_eq!(decode_uid(&encode_uid(id)), Some(id));
        assert_eq!(decode_uid("not-a-uid"), None);
    }
}
