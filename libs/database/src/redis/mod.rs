//! Redis connector backing the token allow-list

mod config;
mod connector;
mod health;

pub use config::RedisConfig;
pub use connector::{connect, connect_with_retry};
pub use health::check_health;

pub use redis::aio::ConnectionManager;
