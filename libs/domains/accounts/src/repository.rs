use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AccountError, AccountResult};
use crate::models::{EmailAddress, User, UserFilter};

/// Repository trait for user accounts and their e-mail addresses
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user without e-mail addresses
    async fn create(&self, user: User) -> AccountResult<User> {
        self.create_with_email_addresses(user, Vec::new()).await
    }

    /// Insert a user and its e-mail addresses in one atomic write
    async fn create_with_email_addresses(
        &self,
        user: User,
        addresses: Vec<EmailAddress>,
    ) -> AccountResult<User>;

    async fn get_by_id(&self, id: Uuid) -> AccountResult<Option<User>>;

    /// Case-insensitive username lookup
    async fn get_by_username(&self, username: &str) -> AccountResult<Option<User>>;

    /// Users whose e-mail matches, case-insensitively
    async fn find_by_email(&self, email: &str) -> AccountResult<Vec<User>>;

    /// Newest first, paginated by `filter`
    async fn list(&self, filter: UserFilter) -> AccountResult<Vec<User>>;

    async fn count(&self, filter: UserFilter) -> AccountResult<usize>;

    /// Save every field; fails on a username taken by another user
    async fn update(&self, user: User) -> AccountResult<User>;

    /// Delete a user and its e-mail addresses
    async fn delete(&self, id: Uuid) -> AccountResult<bool>;

    async fn username_exists(&self, username: &str) -> AccountResult<bool>;

    /// Whether any user or e-mail address uses `email`
    async fn email_exists(&self, email: &str) -> AccountResult<bool>;

    async fn get_email_address(&self, id: Uuid) -> AccountResult<Option<EmailAddress>>;

    async fn list_email_addresses(&self, user_id: Uuid) -> AccountResult<Vec<EmailAddress>>;

    async fn mark_email_verified(&self, id: Uuid) -> AccountResult<EmailAddress>;
}

#[derive(Debug, Default)]
struct Store {
    users: HashMap<Uuid, User>,
    email_addresses: HashMap<Uuid, EmailAddress>,
}

impl Store {
    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.username.eq_ignore_ascii_case(username))
    }
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_with_email_addresses(
        &self,
        user: User,
        addresses: Vec<EmailAddress>,
    ) -> AccountResult<User> {
        let mut store = self.store.write().await;

        if store.username_taken(&user.username, None) {
            return Err(AccountError::DuplicateUsername(user.username));
        }

        for address in addresses {
            store.email_addresses.insert(address.id, address);
        }
        store.users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, username = %user.username, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> AccountResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> AccountResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> AccountResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .values()
            .filter(|u| !u.email.is_empty() && u.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect())
    }

    async fn list(&self, filter: UserFilter) -> AccountResult<Vec<User>> {
        let store = self.store.read().await;

        let mut result: Vec<User> = store
            .users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();

        // Newest first; v7 ids break ties
        result.sort_by(|a, b| b.date_joined.cmp(&a.date_joined).then(b.id.cmp(&a.id)));

        Ok(result
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn count(&self, filter: UserFilter) -> AccountResult<usize> {
        let store = self.store.read().await;
        Ok(store.users.values().filter(|u| filter.matches(u)).count())
    }

    async fn update(&self, user: User) -> AccountResult<User> {
        let mut store = self.store.write().await;

        if !store.users.contains_key(&user.id) {
            return Err(AccountError::NotFound(user.id));
        }

        if store.username_taken(&user.username, Some(user.id)) {
            return Err(AccountError::DuplicateUsername(user.username));
        }

        store.users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, "Updated user");
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> AccountResult<bool> {
        let mut store = self.store.write().await;

        if store.users.remove(&id).is_some() {
            store.email_addresses.retain(|_, a| a.user_id != id);
            tracing::info!(user_id = %id, "Deleted user");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn username_exists(&self, username: &str) -> AccountResult<bool> {
        let store = self.store.read().await;
        Ok(store.username_taken(username, None))
    }

    async fn email_exists(&self, email: &str) -> AccountResult<bool> {
        let store = self.store.read().await;
        let in_users = store
            .users
            .values()
            .any(|u| !u.email.is_empty() && u.email.eq_ignore_ascii_case(email));
        let in_addresses = store
            .email_addresses
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(email));
        Ok(in_users || in_addresses)
    }

    async fn get_email_address(&self, id: Uuid) -> AccountResult<Option<EmailAddress>> {
        let store = self.store.read().await;
        Ok(store.email_addresses.get(&id).cloned())
    }

    async fn list_email_addresses(&self, user_id: Uuid) -> AccountResult<Vec<EmailAddress>> {
        let store = self.store.read().await;
        let mut addresses: Vec<EmailAddress> = store
            .email_addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| b.primary.cmp(&a.primary).then(a.id.cmp(&b.id)));
        Ok(addresses)
    }

    async fn mark_email_verified(&self, id: Uuid) -> AccountResult<EmailAddress> {
        let mut store = self.store.write().await;
        let address = store
            .email_addresses
            .get_mut(&id)
            .ok_or(AccountError::InvalidKey)?;
        address.verified = true;

        tracing::info!(email_address_id = %id, "Verified e-mail address");
        Ok(address.clone())
    }
}
