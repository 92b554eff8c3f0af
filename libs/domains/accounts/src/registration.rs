//! Signup save-path.
//!
//! The account adapter builds and populates the user; this module adds the
//! `added_field`, the e-mail verification state and the atomic write.

use std::sync::Arc;
use validator::Validate;

use crate::adapter::AccountAdapter;
use crate::config::AccountsConfig;
use crate::error::{AccountError, AccountResult};
use crate::models::{EmailAddress, RegisterRequest, RequestContext, User};
use crate::repository::UserRepository;
use crate::tokens::AccountTokens;

pub struct RegistrationService<R: UserRepository> {
    repository: Arc<R>,
    adapter: Arc<dyn AccountAdapter>,
    tokens: AccountTokens,
    config: AccountsConfig,
}

impl<R: UserRepository> Clone for RegistrationService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            adapter: self.adapter.clone(),
            tokens: self.tokens.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: UserRepository> RegistrationService<R> {
    pub fn new(
        repository: Arc<R>,
        adapter: Arc<dyn AccountAdapter>,
        tokens: AccountTokens,
        config: AccountsConfig,
    ) -> Self {
        Self {
            repository,
            adapter,
            tokens,
            config,
        }
    }

    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }

    /// Validate `input` and persist the new account with its primary,
    /// unverified e-mail address. Nothing is written when any check fails.
    pub async fn register(&self, ctx: &RequestContext, input: RegisterRequest) -> AccountResult<User> {
        self.validate(ctx, &input).await?;

        let adapter = &self.adapter;
        let mut user = adapter.new_user(ctx);
        let data = input.into_cleaned_data()?;

        adapter.save_user(ctx, &mut user, &data, false).await?;
        adapter.custom_signup(ctx, &mut user).await?;

        // Signup starts with the primary address only
        let primary = EmailAddress::primary(&user);
        let addresses = vec![primary.clone()];

        user.added_field = data.added_field;

        let user = self
            .repository
            .create_with_email_addresses(user, addresses)
            .await?;

        // The account exists from here on; a mail failure is logged, not returned
        if self.config.email_verification.sends_confirmation() {
            if let Err(e) = self.send_confirmation(ctx, &user, &primary).await {
                tracing::error!(user_id = %user.id, error = %e, "Failed to send confirmation mail");
            }
        }

        tracing::info!(user_id = %user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    async fn send_confirmation(
        &self,
        ctx: &RequestContext,
        user: &User,
        address: &EmailAddress,
    ) -> AccountResult<()> {
        let key = self.tokens.confirmation_key(address)?;
        self.adapter
            .send_confirmation_mail(ctx, user, address, &key)
            .await
    }

    async fn validate(&self, ctx: &RequestContext, input: &RegisterRequest) -> AccountResult<()> {
        if !self.adapter.is_open_for_signup(ctx) {
            return Err(AccountError::SignupClosed);
        }

        input.validate()?;

        if !input.passwords_match() {
            return Err(AccountError::PasswordMismatch);
        }

        if let Some(username) = input.username.as_deref() {
            if self.repository.username_exists(username).await? {
                return Err(AccountError::DuplicateUsername(username.to_string()));
            }
        }

        if self.config.unique_email {
            if let Some(email) = input.email.as_deref() {
                if self.repository.email_exists(email).await? {
                    return Err(AccountError::DuplicateEmail(email.to_string()));
                }
            }
        }

        Ok(())
    }
}
