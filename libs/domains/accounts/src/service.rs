use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapter::AccountAdapter;
use crate::config::{AccountsConfig, EmailVerification};
use crate::error::{AccountError, AccountResult};
use crate::models::{
    CleanedData, CreateUser, EmailAddress, LoginRequest, PasswordChangeRequest,
    PasswordResetConfirmRequest, RequestContext, UpdateUser, User, UserFilter, UserRepresentation,
};
use crate::password::{hash_password, is_usable, verify_password};
use crate::repository::UserRepository;
use crate::tokens::{AccountTokens, decode_uid, encode_uid};

/// Service layer for account business logic
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    adapter: Arc<dyn AccountAdapter>,
    tokens: AccountTokens,
    config: AccountsConfig,
}

impl<R: UserRepository> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            adapter: self.adapter.clone(),
            tokens: self.tokens.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: UserRepository> UserService<R> {
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

    pub fn representation(&self, user: User) -> UserRepresentation {
        let url = self.config.user_url(&user.id);
        UserRepresentation::new(user, url)
    }

    // CRUD

    /// Create through the adapter with an unusable password
    pub async fn create_user(&self, ctx: &RequestContext, input: CreateUser) -> AccountResult<User> {
        if self.repository.username_exists(&input.username).await? {
            return Err(AccountError::DuplicateUsername(input.username));
        }

        let mut user = self.adapter.new_user(ctx);
        user.added_field = input.added_field.clone();

        let data = CleanedData::from(input);
        self.adapter.save_user(ctx, &mut user, &data, true).await?;

        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> AccountResult<User> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    pub async fn list_users(&self, filter: UserFilter) -> AccountResult<(Vec<User>, usize)> {
        let total = self.repository.count(filter.clone()).await?;
        let users = self.repository.list(filter).await?;
        Ok((users, total))
    }

    /// PUT semantics
    pub async fn replace_user(&self, id: Uuid, input: CreateUser) -> AccountResult<User> {
        let mut user = self.get_user(id).await?;
        user.replace(input);
        self.repository.update(user).await
    }

    /// PATCH semantics
    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> AccountResult<User> {
        let mut user = self.get_user(id).await?;
        user.apply_update(input);
        self.repository.update(user).await
    }

    pub async fn delete_user(&self, id: Uuid) -> AccountResult<()> {
        if !self.repository.delete(id).await? {
            return Err(AccountError::NotFound(id));
        }
        Ok(())
    }

    // Authentication

    /// Check credentials and record the login.
    pub async fn authenticate(&self, input: &LoginRequest) -> AccountResult<User> {
        let candidates = match (&input.username, &input.email) {
            (Some(username), _) => self
                .repository
                .get_by_username(username)
                .await?
                .into_iter()
                .collect(),
            (None, Some(email)) => self.repository.find_by_email(email).await?,
            (None, None) => return Err(AccountError::MissingIdentifier),
        };

        let mut matched = None;
        for user in candidates {
            if verify_password(&input.password, &user.password_hash)? {
                matched = Some(user);
                break;
            }
        }
        let mut user = matched.ok_or(AccountError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AccountError::InactiveAccount);
        }

        if self.config.email_verification == EmailVerification::Mandatory
            && !self.has_verified_primary_email(user.id).await?
        {
            return Err(AccountError::EmailNotVerified);
        }

        user.last_login = Some(Utc::now());
        let user = self.repository.update(user).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    pub async fn has_verified_primary_email(&self, user_id: Uuid) -> AccountResult<bool> {
        let addresses = self.repository.list_email_addresses(user_id).await?;
        Ok(addresses.iter().any(|a| a.primary && a.verified))
    }

    pub async fn change_password(&self, id: Uuid, input: PasswordChangeRequest) -> AccountResult<()> {
        let mut user = self.get_user(id).await?;

        if !verify_password(&input.old_password, &user.password_hash)? {
            return Err(AccountError::WrongPassword);
        }
        if input.new_password1 != input.new_password2 {
            return Err(AccountError::PasswordMismatch);
        }

        user.password_hash = hash_password(&input.new_password1)?;
        user.updated_at = Utc::now();
        self.repository.update(user).await?;

        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// Hand a reset token to the adapter for every active user with a
    /// usable password and this e-mail. Unknown addresses are not reported.
    pub async fn request_password_reset(&self, ctx: &RequestContext, email: &str) -> AccountResult<()> {
        let users = self.repository.find_by_email(email).await?;

        for user in users
            .iter()
            .filter(|u| u.is_active && is_usable(&u.password_hash))
        {
            let token = self.tokens.reset_token(user)?;
            self.adapter
                .send_password_reset_mail(ctx, user, &encode_uid(user.id), &token)
                .await?;
        }

        Ok(())
    }

    pub async fn confirm_password_reset(&self, input: PasswordResetConfirmRequest) -> AccountResult<()> {
        let id = decode_uid(&input.uid).ok_or(AccountError::InvalidToken)?;
        let mut user = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(AccountError::InvalidToken)?;

        if !self.tokens.check_reset_token(&user, &input.token) {
            return Err(AccountError::InvalidToken);
        }
        if input.new_password1 != input.new_password2 {
            return Err(AccountError::PasswordMismatch);
        }

        user.password_hash = hash_password(&input.new_password1)?;
        user.updated_at = Utc::now();
        self.repository.update(user).await?;

        tracing::info!(user_id = %id, "Password reset");
        Ok(())
    }

    /// Mark the address named by a confirmation key as verified.
    pub async fn confirm_email(&self, key: &str) -> AccountResult<EmailAddress> {
        let decoded = self
            .tokens
            .verify_confirmation_key(key)
            .ok_or(AccountError::InvalidKey)?;

        let address = self
            .repository
            .get_email_address(decoded.email_address_id)
            .await?
            .ok_or(AccountError::InvalidKey)?;

        if !address.email.eq_ignore_ascii_case(&decoded.email) {
            return Err(AccountError::InvalidKey);
        }
        if address.verified {
            return Ok(address);
        }

        self.repository.mark_email_verified(address.id).await
    }
}
