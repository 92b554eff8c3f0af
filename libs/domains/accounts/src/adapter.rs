//! Account adapter: the pluggable strategy that builds and saves new
//! accounts and delivers account mail.
//!
//! Hosts swap behavior by implementing [`AccountAdapter`] and handing an
//! `Arc<dyn AccountAdapter>` to the services. [`DefaultAccountAdapter`]
//! persists through a [`UserRepository`] and logs outgoing mail.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AccountResult;
use crate::models::{CleanedData, EmailAddress, RequestContext, User};
use crate::password::{hash_password, unusable_password};
use crate::repository::UserRepository;

#[async_trait]
pub trait AccountAdapter: Send + Sync {
    /// A new, unsaved user bound to the request.
    fn new_user(&self, _ctx: &RequestContext) -> User {
        User::new()
    }

    /// Copy the standard fields (username, e-mail, names, password) from
    /// `data` onto `user`. Saves when `commit` is set.
    async fn save_user(
        &self,
        ctx: &RequestContext,
        user: &mut User,
        data: &CleanedData,
        commit: bool,
    ) -> AccountResult<()>;

    /// Runs after `save_user` during signup.
    async fn custom_signup(&self, _ctx: &RequestContext, _user: &mut User) -> AccountResult<()> {
        Ok(())
    }

    fn is_open_for_signup(&self, _ctx: &RequestContext) -> bool {
        true
    }

    async fn send_confirmation_mail(
        &self,
        ctx: &RequestContext,
        user: &User,
        address: &EmailAddress,
        key: &str,
    ) -> AccountResult<()>;

    async fn send_password_reset_mail(
        &self,
        ctx: &RequestContext,
        user: &User,
        uid: &str,
        token: &str,
    ) -> AccountResult<()>;
}

pub struct DefaultAccountAdapter<R: UserRepository> {
    repository: Arc<R>,
}

impl<R: UserRepository> DefaultAccountAdapter<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: UserRepository + 'static> AccountAdapter for DefaultAccountAdapter<R> {
    async fn save_user(
        &self,
        _ctx: &RequestContext,
        user: &mut User,
        data: &CleanedData,
        commit: bool,
    ) -> AccountResult<()> {
        user.username = data.username.clone();
        user.email = data.email.clone();
        user.first_name = data.first_name.clone();
        user.last_name = data.last_name.clone();
        user.password_hash = match &data.password {
            Some(password) => hash_password(password)?,
            None => unusable_password(),
        };

        if commit {
            *user = self.repository.create(user.clone()).await?;
        }

        Ok(())
    }

    async fn send_confirmation_mail(
        &self,
        ctx: &RequestContext,
        user: &User,
        address: &EmailAddress,
        key: &str,
    ) -> AccountResult<()> {
        tracing::info!(
            user_id = %user.id,
            email = %address.email,
            ip = ?ctx.ip,
            "Sending e-mail confirmation"
        );
        tracing::debug!(key, "E-mail confirmation key");
        Ok(())
    }

    async fn send_password_reset_mail(
        &self,
        ctx: &RequestContext,
        user: &User,
        uid: &str,
        token: &str,
    ) -> AccountResult<()> {
        tracing::info!(
            user_id = %user.id,
            email = %user.email,
            ip = ?ctx.ip,
            "Sending password reset e-mail"
        );
        tracing::debug!(uid, token, "Password reset token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::{is_usable, verify_password};
    use crate::repository::InMemoryUserRepository;

    fn data(password: Option<&str>) -> CleanedData {
        CleanedData {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: password.map(String::from),
            first_name: "Alice".into(),
            last_name: "A".into(),
            added_field: "custom-value".into(),
        }
    }

    #[tokio::test]
    async fn test_save_user_without_commit_populates_only() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let adapter = DefaultAccountAdapter::new(repo.clone());
        let ctx = RequestContext::default();

        let mut user = adapter.new_user(&ctx);
        adapter
            .save_user(&ctx, &mut user, &data(Some("Str0ngPass!")), false)
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.first_name, "Alice");
        assert!(user.added_field.is_empty());
        assert!(verify_password("Str0ngPass!", &user.password_hash).unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_user_with_commit_persists_unusable_password() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let adapter = DefaultAccountAdapter::new(repo.clone());
        let ctx = RequestContext::default();

        let mut user = adapter.new_user(&ctx);
        adapter
            .save_user(&ctx, &mut user, &data(None), true)
            .await
            .unwrap();

        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(!is_usable(&stored.password_hash));
    }
}
