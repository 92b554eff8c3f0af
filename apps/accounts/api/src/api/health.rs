//! Readiness checks against the service's dependencies.

use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_helpers::server::{HealthCheckFuture, run_health_checks};

/// `200` when Postgres and the token store answer, `503` otherwise.
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
        (
            "database",
            Box::pin(async {
                database::postgres::check_health(&state.db)
                    .await
                    .map_err(|e| e.to_string())
            }),
        ),
        (
            "token_store",
            Box::pin(async {
                state
                    .jwt_auth
                    .check_store()
                    .await
                    .map_err(|e| format!("Token store ping failed: {}", e))
            }),
        ),
    ];

    run_health_checks(checks).await.into_response()
}
