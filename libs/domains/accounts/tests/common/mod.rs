//! Shared setup for the router tests: in-memory repository, in-memory
//! token store and an adapter that records outgoing account mail.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use axum_helpers::{JwtAuth, JwtConfig};
use domain_accounts::adapter::{AccountAdapter, DefaultAccountAdapter};
use domain_accounts::auth_handlers::{self, AuthState};
use domain_accounts::models::{CleanedData, EmailAddress, RequestContext, User};
use domain_accounts::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-with-enough-length";

/// Confirmation key or reset token handed to the adapter
#[derive(Debug, Clone)]
pub struct SentMail {
    pub user_id: uuid::Uuid,
    pub uid: Option<String>,
    pub token: String,
}

#[derive(Default)]
pub struct Outbox {
    pub confirmations: Mutex<Vec<SentMail>>,
    pub resets: Mutex<Vec<SentMail>>,
}

impl Outbox {
    pub fn last_confirmation(&self) -> SentMail {
        self.confirmations.lock().unwrap().last().cloned().unwrap()
    }

    pub fn last_reset(&self) -> SentMail {
        self.resets.lock().unwrap().last().cloned().unwrap()
    }
}

/// Default adapter that also keeps what it would have mailed.
pub struct RecordingAdapter {
    inner: DefaultAccountAdapter<InMemoryUserRepository>,
    outbox: Arc<Outbox>,
    open: bool,
    mail_fails: bool,
}

#[async_trait]
impl AccountAdapter for RecordingAdapter {
    async fn save_user(
        &self,
        ctx: &RequestContext,
        user: &mut User,
        data: &CleanedData,
        commit: bool,
    ) -> AccountResult<()> {
        self.inner.save_user(ctx, user, data, commit).await
    }

    fn is_open_for_signup(&self, _ctx: &RequestContext) -> bool {
        self.open
    }

    async fn send_confirmation_mail(
        &self,
        _ctx: &RequestContext,
        user: &User,
        _address: &EmailAddress,
        key: &str,
    ) -> AccountResult<()> {
        if self.mail_fails {
            return Err(AccountError::Internal("SMTP connection refused".to_string()));
        }
        self.outbox.confirmations.lock().unwrap().push(SentMail {
            user_id: user.id,
            uid: None,
            token: key.to_string(),
        });
        Ok(())
    }

    async fn send_password_reset_mail(
        &self,
        _ctx: &RequestContext,
        user: &User,
        uid: &str,
        token: &str,
    ) -> AccountResult<()> {
        self.outbox.resets.lock().unwrap().push(SentMail {
            user_id: user.id,
            uid: Some(uid.to_string()),
            token: token.to_string(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub repository: Arc<InMemoryUserRepository>,
    pub outbox: Arc<Outbox>,
}

pub struct TestAppBuilder {
    config: AccountsConfig,
    open_for_signup: bool,
    mail_fails: bool,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: AccountsConfig::default().with_public_base_url("http://testserver"),
            open_for_signup: true,
            mail_fails: false,
        }
    }

    pub fn email_verification(mut self, mode: EmailVerification) -> Self {
        self.config = self.config.with_email_verification(mode);
        self
    }

    pub fn signup_closed(mut self) -> Self {
        self.open_for_signup = false;
        self
    }

    pub fn failing_mail(mut self) -> Self {
        self.mail_fails = true;
        self
    }

    pub fn build(self) -> TestApp {
        let repository = Arc::new(InMemoryUserRepository::new());
        let outbox = Arc::new(Outbox::default());
        let adapter: Arc<dyn AccountAdapter> = Arc::new(RecordingAdapter {
            inner: DefaultAccountAdapter::new(repository.clone()),
            outbox: outbox.clone(),
            open: self.open_for_signup,
            mail_fails: self.mail_fails,
        });

        let jwt_auth = JwtAuth::in_memory(&JwtConfig::new(SECRET).unwrap());
        let tokens = AccountTokens::new(jwt_auth.clone());

        let service = UserService::new(
            repository.clone(),
            adapter.clone(),
            tokens.clone(),
            self.config.clone(),
        );
        let registration =
            RegistrationService::new(repository.clone(), adapter, tokens, self.config);

        let state = AuthState {
            service: service.clone(),
            registration,
            jwt_auth,
        };

        let router = Router::new()
            .nest("/user", handlers::router(service))
            .nest("/auth", auth_handlers::auth_router(state));

        TestApp {
            router,
            repository,
            outbox,
        }
    }
}

impl TestApp {
    pub fn new() -> Self {
        TestAppBuilder::new().build()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(json_request("POST", uri, body)).await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Register `alice` and return the response body.
    pub async fn register_alice(&self) -> Value {
        let response = self.post("/auth/registration", alice()).await;
        assert_eq!(response.status(), 201);
        json_body(response.into_body()).await
    }

    /// Log in as `alice` and return the response body.
    pub async fn login_alice(&self) -> Value {
        let response = self
            .post(
                "/auth/login",
                json!({ "username": "alice", "password": "Str0ngPass!" }),
            )
            .await;
        assert_eq!(response.status(), 200);
        json_body(response.into_body()).await
    }
}

pub fn alice() -> Value {
    json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": "Str0ngPass!",
        "first_name": "Alice",
        "last_name": "A",
        "added_field": "custom-value"
    })
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
