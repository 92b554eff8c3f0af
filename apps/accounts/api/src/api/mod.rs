use axum::Router;

pub mod auth;
pub mod health;
pub mod users;

/// Account routes, mounted at the server root.
pub fn routes(state: &crate::state::AppState) -> Router {
    Router::new()
        .nest("/user", users::router(state))
        .nest("/auth", auth::router(state))
}

/// `/ready`, with checks against the database and the token store.
pub fn ready_router(state: crate::state::AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
