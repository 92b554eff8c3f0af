//! # Axum Helpers
//!
//! Shared HTTP plumbing for the accounts service.
//!
//! - **[`auth`]**: JWT tokens with a Redis or in-memory allow-list/deny-list
//! - **[`server`]**: router assembly, health checks, graceful shutdown
//! - **[`http`]**: CORS and security headers
//! - **[`errors`]**: structured error envelope with error codes
//! - **[`extractors`]**: `UuidPath` and `ValidatedJson`
//! - **[`audit`]**: audit log for account actions

pub mod audit;
pub mod auth;
pub mod errors;
pub mod extractors;
pub mod http;
pub mod server;

pub use auth::{
    ACCESS_TOKEN_TTL, AuthUser, InMemoryTokenStore, JwtAuth, JwtClaims, JwtConfig,
    REFRESH_TOKEN_TTL, RedisAuthStore, TokenKind, TokenPair, TokenStore, jwt_auth_middleware,
};

pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, create_production_app, create_router,
    create_router_with_cors, health_router, run_health_checks,
};

pub use http::{cors_layer, security_headers};

pub use errors::{AppError, ErrorCode, ErrorResponse};

pub use extractors::{UuidPath, ValidatedJson};

pub use audit::{AuditAction, AuditEvent, AuditOutcome, extract_ip_from_headers, extract_user_agent};
