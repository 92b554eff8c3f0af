use axum::http::HeaderMap;
use axum_helpers::{extract_ip_from_headers, extract_user_agent};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::LazyLock;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::password::validate_password_policy;

const REQUIRED: &str = "This field is required.";

/// Largest page `GET /user` serves
pub const MAX_PAGE_SIZE: usize = 100;

/// Letters, digits and `@ . + - _`
static USERNAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9@.+_-]+$").unwrap());

fn validate_username(username: &str) -> Result<(), ValidationError> {
    validate_not_blank(username)?;
    if !USERNAME_CHARS.is_match(username) {
        return Err(ValidationError::new("invalid_username").with_message(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.".into(),
        ));
    }
    Ok(())
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new("blank").with_message("This field may not be blank.".into()));
    }
    Ok(())
}

/// Text fields arrive with surrounding whitespace stripped.
fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

fn trimmed_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(|s| s.trim().to_string()))
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Empty for accounts created through `/user`
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub added_field: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Blank, unsaved account with a fresh id.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            username: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            added_field: String::new(),
            password_hash: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: now,
            last_login: None,
            updated_at: now,
        }
    }

    /// PUT: replace every writable field.
    pub fn replace(&mut self, input: CreateUser) {
        self.username = input.username;
        self.first_name = input.first_name;
        self.last_name = input.last_name;
        self.added_field = input.added_field;
        self.updated_at = Utc::now();
    }

    /// PATCH: replace the fields present in `update`.
    pub fn apply_update(&mut self, update: UpdateUser) {
        if let Some(username) = update.username {
            self.username = username;
        }
        if let Some(first_name) = update.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name;
        }
        if let Some(added_field) = update.added_field {
            self.added_field = added_field;
        }
        self.updated_at = Utc::now();
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

/// User resource as served under `/user`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRepresentation {
    pub id: Uuid,
    /// Absolute link to this resource
    pub url: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub added_field: String,
}

impl UserRepresentation {
    pub fn new(user: User, url: String) -> Self {
        Self {
            id: user.id,
            url,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            added_field: user.added_field,
        }
    }
}

/// Authenticated user as served under `/auth/user`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDetails {
    pub pk: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub added_field: String,
}

impl From<User> for UserDetails {
    fn from(user: User) -> Self {
        Self {
            pk: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            added_field: user.added_field,
        }
    }
}

/// One e-mail address of an account and its verification state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmailAddress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub verified: bool,
    pub primary: bool,
}

impl EmailAddress {
    /// Unverified primary address for `user`.
    pub fn primary(user: &User) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user.id,
            email: user.email.clone(),
            verified: false,
            primary: true,
        }
    }
}

/// Signup payload
#[derive(Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(
        required(message = "This field is required."),
        length(max = 150),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(
        required(message = "This field is required."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,
    #[serde(alias = "password")]
    #[validate(
        required(message = "This field is required."),
        custom(function = "validate_password_policy")
    )]
    pub password1: Option<String>,
    /// Confirmation, checked against `password1` when present
    pub password2: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(
        required(message = "This field is required."),
        custom(function = "validate_not_blank"),
        length(max = 150)
    )]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(
        required(message = "This field is required."),
        custom(function = "validate_not_blank"),
        length(max = 150)
    )]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(
        required(message = "This field is required."),
        custom(function = "validate_not_blank"),
        length(max = 255)
    )]
    pub added_field: Option<String>,
}

impl RegisterRequest {
    pub fn passwords_match(&self) -> bool {
        match &self.password2 {
            Some(confirmation) => self.password1.as_ref() == Some(confirmation),
            None => true,
        }
    }

    /// Fields of a validated payload. A missing required field is reported
    /// the same way validation reports it.
    pub fn into_cleaned_data(self) -> Result<CleanedData, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut take = |field: &'static str, value: Option<String>| {
            value.unwrap_or_else(|| {
                errors.add(field, ValidationError::new("required").with_message(REQUIRED.into()));
                String::new()
            })
        };

        let cleaned = CleanedData {
            username: take("username", self.username),
            email: take("email", self.email),
            password: Some(take("password1", self.password1)),
            first_name: take("first_name", self.first_name),
            last_name: take("last_name", self.last_name),
            added_field: take("added_field", self.added_field),
        };

        if errors.errors().is_empty() {
            Ok(cleaned)
        } else {
            Err(errors)
        }
    }
}

/// Validated signup fields handed to the account adapter
#[derive(Clone)]
pub struct CleanedData {
    pub username: String,
    pub email: String,
    /// `None` stores an unusable password
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub added_field: String,
}

impl fmt::Debug for CleanedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanedData")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("added_field", &self.added_field)
            .finish()
    }
}

/// Body of `POST /user` and `PUT /user/{id}`
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[serde(deserialize_with = "trimmed")]
    #[validate(
        length(max = 150),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "validate_not_blank"), length(max = 255))]
    pub added_field: String,
}

impl From<CreateUser> for CleanedData {
    fn from(input: CreateUser) -> Self {
        Self {
            username: input.username,
            email: String::new(),
            password: None,
            first_name: input.first_name,
            last_name: input.last_name,
            added_field: input.added_field,
        }
    }
}

/// Body of `PATCH /user/{id}` and `PUT`/`PATCH /auth/user`
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(
        length(max = 150),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(custom(function = "validate_not_blank"), length(max = 255))]
    pub added_field: Option<String>,
}

/// Query filters for listing users
#[derive(Debug, Clone, Deserialize, Validate, ToSchema, IntoParams)]
pub struct UserFilter {
    /// Case-insensitive substring of the username
    pub username: Option<String>,
    /// Page size, at most 100
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            username: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        match &self.username {
            Some(needle) => user
                .username
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// Paginated list of users
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    pub data: Vec<UserRepresentation>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Login with a username or an e-mail address
#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub old_password: String,
    #[validate(custom(function = "validate_password_policy"))]
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirmRequest {
    pub uid: String,
    pub token: String,
    #[validate(custom(function = "validate_password_policy"))]
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub key: String,
}

/// Refresh or logout body; the token may come from the cookie instead
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Tokens and the authenticated user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user: UserDetails,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailResponse {
    pub detail: String,
}

impl DetailResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Caller metadata available to the account adapter
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip: extract_ip_from_headers(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}
