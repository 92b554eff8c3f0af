//! Connectors and start-up utilities for the stores the accounts service uses.
//!
//! # Features
//!
//! - `postgres` (default) - PostgreSQL via SeaORM, migrations, health checks
//! - `redis` (default) - Redis connection manager for the token store
//! - `config` - `core_config::FromEnv` implementations for the config structs
//! - `all` - everything above
//!
//! # Example
//!
//! ```ignore
//! use database::postgres::{self, PostgresConfig};
//! use migration::Migrator;
//!
//! let db = postgres::connect_from_config_with_retry(PostgresConfig::from_env()?, None).await?;
//! postgres::run_migrations::<Migrator>(&db, "accounts_api").await?;
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use common::{DatabaseError, DatabaseResult};
