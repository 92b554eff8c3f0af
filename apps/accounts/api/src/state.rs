//! Shared application state.

use axum_helpers::JwtAuth;
use database::redis::ConnectionManager;
use domain_accounts::{
    AccountAdapter, AccountTokens, DefaultAccountAdapter, PgUserRepository, RegistrationService,
    UserService,
};
use std::sync::Arc;

/// Cloned into every router; all fields are cheap `Arc`-backed handles.
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    pub db: database::postgres::DatabaseConnection,
    /// Present when the token store is Redis-backed
    pub redis: Option<ConnectionManager>,
    pub jwt_auth: JwtAuth,
    pub users: UserService<PgUserRepository>,
    pub registration: RegistrationService<PgUserRepository>,
}

impl AppState {
    pub fn new(
        config: crate::config::Config,
        db: database::postgres::DatabaseConnection,
        redis: Option<ConnectionManager>,
        jwt_auth: JwtAuth,
    ) -> Self {
        let repository = Arc::new(PgUserRepository::new(db.clone()));
        let adapter: Arc<dyn AccountAdapter> =
            Arc::new(DefaultAccountAdapter::new(repository.clone()));
        let tokens = AccountTokens::new(jwt_auth.clone());

        let users = UserService::new(
            repository.clone(),
            adapter.clone(),
            tokens.clone(),
            config.accounts.clone(),
        );
        let registration =
            RegistrationService::new(repository, adapter, tokens, config.accounts.clone());

        Self {
            config,
            db,
            redis,
            jwt_auth,
            users,
            registration,
        }
    }
}
