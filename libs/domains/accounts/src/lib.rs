//! Accounts Domain
//!
//! User records plus the signup, login and account-management flows built
//! around them.
//!
//! # Features
//!
//! - User CRUD under `/user`, each record carrying a required `added_field`
//! - Registration that persists the user and its primary e-mail address
//!   in one write
//! - Pluggable [`AccountAdapter`] for building users and delivering mail
//! - JWT login, logout and refresh with token cookies
//! - Password change and token-based password reset
//! - E-mail confirmation keys
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │ handlers / auth_handlers │  ← HTTP endpoints
//! └────────────┬─────────────┘
//!              │
//! ┌────────────▼─────────────┐
//! │ UserService              │  ← CRUD, login, passwords, confirmation
//! │ RegistrationService      │  ← signup save-path
//! └──────┬─────────────┬─────┘
//!        │             │
//! ┌──────▼──────┐ ┌────▼─────────┐
//! │ Repository  │ │ AccountAdapter│  ← persistence / user building + mail
//! └──────┬──────┘ └──────────────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← records, payloads, entities
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum_helpers::{JwtAuth, JwtConfig};
//! use domain_accounts::{
//!     AccountTokens, AccountsConfig, DefaultAccountAdapter, InMemoryUserRepository,
//!     UserService, handlers,
//! };
//!
//! let jwt = JwtAuth::in_memory(&JwtConfig::new("a-secret-of-at-least-32-characters!").unwrap());
//! let repository = Arc::new(InMemoryUserRepository::new());
//! let adapter = Arc::new(DefaultAccountAdapter::new(repository.clone()));
//! let service = UserService::new(
//!     repository,
//!     adapter,
//!     AccountTokens::new(jwt),
//!     AccountsConfig::default(),
//! );
//!
//! let router = handlers::router(service);
//! ```

pub mod adapter;
pub mod auth_handlers;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod postgres;
pub mod registration;
pub mod repository;
pub mod service;
pub mod tokens;

pub use adapter::{AccountAdapter, DefaultAccountAdapter};
pub use auth_handlers::AuthState;
pub use config::{AccountsConfig, EmailVerification};
pub use error::{AccountError, AccountResult};
pub use models::{
    CreateUser, EmailAddress, LoginRequest, RegisterRequest, UpdateUser, User, UserFilter,
    UserRepresentation,
};
pub use postgres::PgUserRepository;
pub use registration::RegistrationService;
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::UserService;
pub use tokens::AccountTokens;
