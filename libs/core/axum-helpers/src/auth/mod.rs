//! JWT authentication.
//!
//! - [`JwtAuth`]: HS256 tokens checked against a [`TokenStore`] allow-list
//!   and deny-list (Redis or in-memory)
//! - [`jwt_auth_middleware`] and the [`AuthUser`] extractor for protected routes
//! - token cookie helpers
//!
//! ```ignore
//! let config = JwtConfig::from_env()?;
//! let auth = JwtAuth::new(Arc::new(RedisAuthStore::new(redis_manager)), &config);
//!
//! let protected = Router::new()
//!     .route("/user", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(auth, jwt_auth_middleware));
//! ```

pub mod config;
pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod store;

pub use config::JwtConfig;
pub use cookies::{access_cookie, clear_token_cookies, token_cookies};
pub use jwt::{ACCESS_TOKEN_TTL, JwtAuth, JwtClaims, REFRESH_TOKEN_TTL, TokenKind, TokenPair};
pub use middleware::{
    ACCESS_TOKEN_COOKIE, AuthUser, REFRESH_TOKEN_COOKIE, cookie_value, extract_token_from_request,
    jwt_auth_middleware,
};
pub use store::{InMemoryTokenStore, RedisAuthStore, TokenStore};
