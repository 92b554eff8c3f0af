use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    entity::{email_address, user},
    error::{AccountError, AccountResult},
    models::{EmailAddress, MAX_PAGE_SIZE, User, UserFilter},
    repository::UserRepository,
};

/// PostgreSQL implementation of UserRepository using SeaORM
#[derive(Clone)]
pub struct PgUserRepository {
    db: DatabaseConnection,
}

impl PgUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn filtered(filter: &UserFilter) -> Select<user::Entity> {
        let mut query = user::Entity::find();

        if let Some(ref needle) = filter.username {
            let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(user::Column::Username)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }

        query
    }

    fn page(filter: &UserFilter) -> Select<user::Entity> {
        let offset = i64::try_from(filter.offset).unwrap_or(i64::MAX) as u64;

        Self::filtered(filter)
            .order_by_desc(user::Column::DateJoined)
            .order_by_desc(user::Column::Id)
            .limit(filter.limit.min(MAX_PAGE_SIZE) as u64)
            .offset(offset)
    }

    fn by_username(username: &str) -> Select<user::Entity> {
        user::Entity::find().filter(
            Expr::expr(Func::lower(Expr::col(user::Column::Username))).eq(username.to_lowercase()),
        )
    }

    fn by_email(email: &str) -> Select<user::Entity> {
        user::Entity::find()
            .filter(user::Column::Email.ne(""))
            .filter(Expr::expr(Func::lower(Expr::col(user::Column::Email))).eq(email.to_lowercase()))
    }
}

/// `LIKE` wildcards in `value` matched literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Unique index on `lower(username)` is the only one on `users`.
fn map_write_error(err: DbErr, username: &str) -> AccountError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AccountError::DuplicateUsername(username.to_string())
        }
        _ => AccountError::Database(err),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_with_email_addresses(
        &self,
        user: User,
        addresses: Vec<EmailAddress>,
    ) -> AccountResult<User> {
        let txn = self.db.begin().await?;

        let model = user::ActiveModel::from(&user)
            .insert(&txn)
            .await
            .map_err(|e| map_write_error(e, &user.username))?;

        for address in &addresses {
            email_address::ActiveModel::from(address).insert(&txn).await?;
        }

        txn.commit().await?;

        tracing::info!(user_id = %model.id, username = %model.username, "Created user");
        Ok(model.into())
    }

    async fn get_by_id(&self, id: Uuid) -> AccountResult<Option<User>> {
        let model = user::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn get_by_username(&self, username: &str) -> AccountResult<Option<User>> {
        let model = Self::by_username(username).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> AccountResult<Vec<User>> {
        let models = Self::by_email(email).all(&self.db).await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn list(&self, filter: UserFilter) -> AccountResult<Vec<User>> {
        let models = Self::page(&filter).all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn count(&self, filter: UserFilter) -> AccountResult<usize> {
        let count = Self::filtered(&filter).count(&self.db).await?;
        Ok(count as usize)
    }

    async fn update(&self, user: User) -> AccountResult<User> {
        if user::Entity::find_by_id(user.id).one(&self.db).await?.is_none() {
            return Err(AccountError::NotFound(user.id));
        }

        let taken = Self::by_username(&user.username)
            .filter(user::Column::Id.ne(user.id))
            .one(&self.db)
            .await?
            .is_some();
        if taken {
            return Err(AccountError::DuplicateUsername(user.username));
        }

        let model = user::ActiveModel::from(&user)
            .update(&self.db)
            .await
            .map_err(|e| map_write_error(e, &user.username))?;

        tracing::info!(user_id = %model.id, "Updated user");
        Ok(model.into())
    }

    async fn delete(&self, id: Uuid) -> AccountResult<bool> {
        let result = user::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected > 0 {
            tracing::info!(user_id = %id, "Deleted user");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn username_exists(&self, username: &str) -> AccountResult<bool> {
        Ok(Self::by_username(username).one(&self.db).await?.is_some())
    }

    async fn email_exists(&self, email: &str) -> AccountResult<bool> {
        if Self::by_email(email).one(&self.db).await?.is_some() {
            return Ok(true);
        }

        let address = email_address::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(email_address::Column::Email)))
                    .eq(email.to_lowercase()),
            )
            .one(&self.db)
            .await?;

        Ok(address.is_some())
    }

    async fn get_email_address(&self, id: Uuid) -> AccountResult<Option<EmailAddress>> {
        let model = email_address::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list_email_addresses(&self, user_id: Uuid) -> AccountResult<Vec<EmailAddress>> {
        let models = email_address::Entity::find()
            .filter(email_address::Column::UserId.eq(user_id))
            .order_by_desc(email_address::Column::Primary)
            .order_by_asc(email_address::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn mark_email_verified(&self, id: Uuid) -> AccountResult<EmailAddress> {
        let model = email_address::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AccountError::InvalidKey)?;

        let mut active: email_address::ActiveModel = model.into();
        active.verified = sea_orm::ActiveValue::Set(true);
        let model = active.update(&self.db).await?;

        tracing::info!(email_address_id = %id, "Verified e-mail address");
        Ok(model.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};

    fn user_model(username: &str) -> user::Model {
        let now = Utc::now().into();
        user::Model {
            id: Uuid::now_v7(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: "Alice".to_string(),
            last_name: "A".to_string(),
            added_field: "custom-value".to_string(),
            password_hash: "!unusable".to_string(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: now,
            last_login: None,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_get_by_id_maps_model() {
        let model = user_model("alice");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model.clone()]])
            .into_connection();
        let repo = PgUserRepository::new(db);

        let user = repo.get_by_id(model.id).await.unwrap().unwrap();
        assert_eq!(user.id, model.id);
        assert_eq!(user.added_field, "custom-value");
        assert_eq!(user.date_joined, model.date_joined);
    }

    #[tokio::test]
    async fn test_create_persists_user_and_addresses() {
        let model = user_model("alice");
        let user: User = model.clone().into();
        let address = EmailAddress::primary(&user);
        let address_model = email_address::Model {
            id: address.id,
            user_id: address.user_id,
            email: address.email.clone(),
            verified: false,
            primary: true,
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model.clone()]])
            .append_query_results([vec![address_model]])
            .into_connection();
        let repo = PgUserRepository::new(db);

        let created = repo
            .create_with_email_addresses(user, vec![address])
            .await
            .unwrap();
        assert_eq!(created.username, "alice");
    }

    #[tokio::test]
    async fn test_list_maps_models() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model("alice"), user_model("alicia")]])
            .into_connection();
        let repo = PgUserRepository::new(db);

        let users = repo.list(UserFilter::default()).await.unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();
        let repo = PgUserRepository::new(db);

        let id = Uuid::now_v7();
        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_of_missing_user_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let repo = PgUserRepository::new(db);

        let result = repo.update(User::new()).await;
        assert!(matches!(result, Err(AccountError::NotFound(_))));
    }

    #[test]
    fn test_escape_like_quotes_wildcards() {
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("alice"), "alice");
    }

    #[test]
    fn test_username_filter_binds_escaped_pattern() {
        let filter = UserFilter {
            username: Some("A_b".into()),
            ..Default::default()
        };
        let statement = PgUserRepository::filtered(&filter).build(DatabaseBackend::Postgres);

        assert!(statement.sql.contains("ESCAPE"), "{}", statement.sql);
        let values = format!("{:?}", statement.values);
        assert!(values.contains(r#"%a\\_b%"#), "{}", values);
    }

    #[test]
    fn test_page_bounds_limit_and_offset() {
        let filter = UserFilter {
            username: None,
            limit: usize::MAX,
            offset: usize::MAX,
        };
        let statement = PgUserRepository::page(&filter).build(DatabaseBackend::Postgres);
        let values = format!("{:?}", statement.values);

        assert!(!values.contains(&u64::MAX.to_string()), "{}", values);
        assert!(values.contains(&MAX_PAGE_SIZE.to_string()), "{}", values);
        assert!(values.contains(&i64::MAX.to_string()), "{}", values);
    }
}
