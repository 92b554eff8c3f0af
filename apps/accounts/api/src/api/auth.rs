use axum::Router;
use domain_accounts::auth_handlers::{AuthState, auth_router};

pub fn router(state: &crate::state::AppState) -> Router {
    let auth_state = AuthState {
        service: state.users.clone(),
        registration: state.registration.clone(),
        jwt_auth: state.jwt_auth.clone(),
    };

    auth_router(auth_state)
}
