use super::config::JwtConfig;
use super::store::{InMemoryTokenStore, TokenStore};
use crate::errors::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use uuid::Uuid;

/// JWT token time-to-live constants
pub const ACCESS_TOKEN_TTL: i64 = 900; // 15 minutes
pub const REFRESH_TOKEN_TTL: i64 = 604800; // 7 days

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn ttl(self) -> i64 {
        match self {
            TokenKind::Access => ACCESS_TOKEN_TTL,
            TokenKind::Refresh => REFRESH_TOKEN_TTL,
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,      // User ID
    pub username: String, // Login name
    pub email: String,    // Primary email, may be empty
    pub kind: TokenKind,  // Access or refresh
    pub exp: i64,         // Expiration time
    pub iat: i64,         // Issued at
    pub jti: String,      // JWT ID (for whitelist/blacklist)
}

impl JwtClaims {
    /// Seconds left before `exp`, never negative.
    pub fn remaining_ttl(&self) -> u64 {
        (self.exp - Utc::now().timestamp()).max(0) as u64
    }
}

/// Issued access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Stateless JWT tokens checked against a server-side allow-list and
/// deny-list ([`TokenStore`]).
#[derive(Clone)]
pub struct JwtAuth {
    secret: Arc<str>,
    store: Arc<dyn TokenStore>,
}

impl JwtAuth {
    /// ```ignore
    /// let config = JwtConfig::from_env()?;
    /// let jwt_auth = JwtAuth::new(Arc::new(RedisAuthStore::new(manager)), &config);
    /// ```
    pub fn new(store: Arc<dyn TokenStore>, config: &JwtConfig) -> Self {
        tracing::info!("JWT auth initialized");
        Self {
            secret: Arc::from(config.secret.as_str()),
            store,
        }
    }

    /// Auth backed by an [`InMemoryTokenStore`].
    pub fn in_memory(config: &JwtConfig) -> Self {
        Self::new(Arc::new(InMemoryTokenStore::new()), config)
    }

    /// Create an access token (15 min). Not yet whitelisted.
    pub fn create_access_token(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> eyre::Result<(String, JwtClaims)> {
        self.create_token(user_id, username, email, TokenKind::Access)
    }

    /// Create a refresh token (7 days). Not yet whitelisted.
    pub fn create_refresh_token(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> eyre::Result<(String, JwtClaims)> {
        self.create_token(user_id, username, email, TokenKind::Refresh)
    }

    fn create_token(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        kind: TokenKind,
    ) -> eyre::Result<(String, JwtClaims)> {
        let now = Utc::now();

        let claims = JwtClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            kind,
            exp: (now + Duration::seconds(kind.ttl())).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// Create and whitelist a token of `kind`.
    pub async fn issue_token(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        kind: TokenKind,
    ) -> eyre::Result<String> {
        let (token, claims) = self.create_token(user_id, username, email, kind)?;
        self.store
            .whitelist(&claims.jti, user_id, kind.ttl() as u64)
            .await?;
        Ok(token)
    }

    /// Create and whitelist an access/refresh pair.
    pub async fn issue_tokens(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> eyre::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self
                .issue_token(user_id, username, email, TokenKind::Access)
                .await?,
            refresh_token: self
                .issue_token(user_id, username, email, TokenKind::Refresh)
                .await?,
        })
    }

    /// Verify JWT token signature and expiry, and decode claims
    pub fn verify_token(&self, token: &str) -> eyre::Result<JwtClaims> {
        self.decode(token)
    }

    /// Full check: signature, expiry, kind, deny-list and allow-list.
    pub async fn authenticate(&self, token: &str, kind: TokenKind) -> Result<JwtClaims, AppError> {
        let claims = self.verify_token(token).map_err(|e| {
            tracing::debug!("JWT verification failed: {}", e);
            AppError::Unauthorized("Token is invalid or expired".to_string())
        })?;

        if claims.kind != kind {
            return Err(AppError::Unauthorized("Token is invalid or expired".to_string()));
        }

        if self.store.is_blacklisted(&claims.jti).await.map_err(store_unavailable)? {
            tracing::debug!(jti = %claims.jti, "Token is blacklisted");
            return Err(AppError::Unauthorized("Token has been revoked".to_string()));
        }

        if !self.store.is_whitelisted(&claims.jti).await.map_err(store_unavailable)? {
            tracing::debug!(jti = %claims.jti, "Token is not whitelisted");
            return Err(AppError::Unauthorized("Token has been revoked".to_string()));
        }

        Ok(claims)
    }

    /// Remove from the allow-list and deny-list for the rest of its lifetime.
    pub async fn revoke(&self, claims: &JwtClaims) -> eyre::Result<()> {
        self.store.revoke(&claims.jti).await?;
        self.store
            .blacklist(&claims.jti, claims.remaining_ttl())
            .await?;
        tracing::debug!(jti = %claims.jti, "Revoked and blacklisted token");
        Ok(())
    }

    /// Sign arbitrary claims with the service secret (HS256).
    ///
    /// Claims must carry an `exp` field.
    pub fn sign<C: Serialize>(&self, claims: &C) -> eyre::Result<String> {
        let header = Header::new(jsonwebtoken::Algorithm::HS256);
        Ok(encode(
            &header,
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    /// Verify signature and expiry of a token produced by [`JwtAuth::sign`].
    pub fn decode<C: DeserializeOwned + Clone>(&self, token: &str) -> eyre::Result<C> {
        let data = decode::<C>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    /// Readiness check of the token store.
    pub async fn check_store(&self) -> eyre::Result<()> {
        self.store.ping().await
    }
}

fn store_unavailable(e: eyre::Report) -> AppError {
    tracing::error!("Token store error: {:?}", e);
    AppError::ServiceUnavailable("Service temporarily unavailable".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> JwtAuth {
        JwtAuth::in_memory(&JwtConfig::new("test-secret-that-is-long-enough-for-hs256").unwrap())
    }

    #[tokio::test]
    async fn test_issued_access_token_authenticates() {
        let auth = auth();
        let pair = auth.issue_tokens("user-1", "alice", "alice@example.com").await.unwrap();

        let claims = auth
            .authenticate(&pair.access_token, TokenKind::Access)
            .await
            .unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "alice");
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let auth = auth();
        let pair = auth.issue_tokens("user-1", "alice", "").await.unwrap();

        let err = auth
            .authenticate(&pair.refresh_token, TokenKind::Access)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_unwhitelisted_token_is_rejected() {
        let auth = auth();
        let (token, _) = auth.create_access_token("user-1", "alice", "").unwrap();

        assert!(auth.authenticate(&token, TokenKind::Access).await.is_err());
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let auth = auth();
        let pair = auth.issue_tokens("user-1", "alice", "").await.unwrap();
        let claims = auth.verify_token(&pair.access_token).unwrap();

        auth.revoke(&claims).await.unwrap();

        let err = auth
            .authenticate(&pair.access_token, TokenKind::Access)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("revoked"));
    }

    #[test]
    fn test_token_signed_with_other_secret_fails() {
        let (token, _) = auth().create_access_token("user-1", "alice", "").unwrap();
        let other = JwtAuth::in_memory(
            &JwtConfig::new("another-secret-that-is-long-enough-too").unwrap(),
        );

        assert!(other.verify_token(&token).is_err());
    }
}
