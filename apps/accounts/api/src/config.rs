use axum_helpers::JwtConfig;
use core_config::{AppInfo, FromEnv, app_info, env_optional, server::ServerConfig};
use database::postgres::PostgresConfig;
use database::redis::RedisConfig;
use domain_accounts::AccountsConfig;

pub use core_config::Environment;

/// Service configuration, composed from the shared config components
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    /// Token store; in-memory when `REDIS_URL` is unset
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub accounts: AccountsConfig,
    pub server: ServerConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // DATABASE_URL is required
        let server = ServerConfig::from_env()?;
        let jwt = JwtConfig::from_env()?;
        let accounts = AccountsConfig::from_env()?;
        let redis = env_optional("REDIS_URL").map(RedisConfig::new);

        Ok(Self {
            app: app_info!(),
            database,
            redis,
            jwt,
            accounts,
            server,
            environment,
        })
    }
}
