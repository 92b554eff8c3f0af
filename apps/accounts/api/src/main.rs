use axum_helpers::server::{create_production_app, health_router};
use axum_helpers::{JwtAuth, RedisAuthStore};
use core_config::tracing::{init_tracing, install_color_eyre};
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Before any fallible operation
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    database::postgres::run_migrations::<migration::Migrator>(&db, config.app.name)
        .await
        .map_err(|e| eyre::eyre!("Migrations failed: {}", e))?;

    let redis = match &config.redis {
        Some(redis_config) => Some(
            database::redis::connect_with_retry(redis_config, None)
                .await
                .map_err(|e| eyre::eyre!("Redis connection failed: {}", e))?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set, using the in-memory token store");
            None
        }
    };

    let jwt_auth = match &redis {
        Some(manager) => JwtAuth::new(Arc::new(RedisAuthStore::new(manager.clone())), &config.jwt),
        None => JwtAuth::in_memory(&config.jwt),
    };

    let state = AppState::new(config, db, redis, jwt_auth);

    let api_routes = api::routes(&state);
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    // /health is liveness only; /ready checks the database and token store
    let app = router
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()));

    info!(
        "Starting accounts API ({:?} shutdown timeout)",
        state.config.server.shutdown_timeout
    );

    let server_config = state.config.server.clone();
    create_production_app(app, &server_config, async move {
        info!("Shutting down: closing database connections");

        match state.db.close().await {
            Ok(_) => info!("PostgreSQL connection closed successfully"),
            Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
        }

        // Redis ConnectionManager closes on drop
        drop(state.redis);
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Accounts API shutdown complete");
    Ok(())
}
