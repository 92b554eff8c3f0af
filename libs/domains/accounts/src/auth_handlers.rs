//! `/auth` endpoints: registration, login, logout, token refresh, current
//! user, password change and reset, e-mail verification.
//!
//! Tokens are returned in the body and as `HttpOnly` cookies. Protected
//! routes accept `Authorization: Bearer` or the `access_token` cookie.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};
use axum_helpers::{
    AppError, AuditAction, AuditEvent, AuditOutcome, AuthUser, JwtAuth, TokenKind, ValidatedJson,
    auth::{
        REFRESH_TOKEN_COOKIE, access_cookie, clear_token_cookies, cookie_value,
        extract_token_from_request, token_cookies,
    },
    errors::responses::{
        BadRequestResponse, BadRequestValidationResponse, ConflictResponse, ForbiddenResponse,
        InternalServerErrorResponse, NotFoundResponse, UnauthorizedResponse,
    },
    jwt_auth_middleware,
};
use serde_json::json;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::config::EmailVerification;
use crate::error::AccountError;
use crate::models::{
    DetailResponse, LoginRequest, LoginResponse, PasswordChangeRequest,
    PasswordResetConfirmRequest, PasswordResetRequest, RefreshRequest, RefreshResponse,
    RegisterRequest, RequestContext, UpdateUser, User, UserDetails, VerifyEmailRequest,
};
use crate::registration::RegistrationService;
use crate::repository::UserRepository;
use crate::service::UserService;

pub const TAG: &str = "auth";

const TOKEN_TYPE: &str = "Bearer";

/// OpenAPI documentation for the auth endpoints
#[derive(OpenApi)]
#[openapi(
    paths(
        register,
        verify_email,
        login,
        logout,
        refresh,
        current_user,
        replace_current_user,
        update_current_user,
        change_password,
        password_reset,
        password_reset_confirm,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            RefreshRequest,
            RefreshResponse,
            UserDetails,
            UpdateUser,
            PasswordChangeRequest,
            PasswordResetRequest,
            PasswordResetConfirmRequest,
            VerifyEmailRequest,
            DetailResponse,
        ),
        responses(
            BadRequestResponse,
            BadRequestValidationResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            NotFoundResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = TAG, description = "Registration and authentication"))
)]
pub struct AuthApiDoc;

/// Application state for auth handlers
pub struct AuthState<R: UserRepository> {
    pub service: UserService<R>,
    pub registration: RegistrationService<R>,
    pub jwt_auth: JwtAuth,
}

impl<R: UserRepository> Clone for AuthState<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            registration: self.registration.clone(),
            jwt_auth: self.jwt_auth.clone(),
        }
    }
}

impl<R: UserRepository> AuthState<R> {
    fn secure_cookies(&self) -> bool {
        self.service.config().secure_cookies
    }

    async fn issue_login(&self, user: User) -> Result<(Response, String), AppError> {
        let pair = self
            .jwt_auth
            .issue_tokens(&user.id.to_string(), &user.username, &user.email)
            .await
            .map_err(token_error)?;

        let cookies = token_cookies(&pair.access_token, &pair.refresh_token, self.secure_cookies())?;
        let user_id = user.id.to_string();
        let body = LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            user: user.into(),
        };

        Ok(((AppendHeaders(cookies), Json(body)).into_response(), user_id))
    }
}

fn token_error(e: eyre::Report) -> AppError {
    tracing::error!("Failed to issue tokens: {:?}", e);
    AppError::ServiceUnavailable("Service temporarily unavailable".to_string())
}

/// A token whose user is gone no longer authenticates. Other lookup
/// failures propagate.
fn token_owner_error(err: AccountError) -> AccountError {
    match err {
        AccountError::NotFound(_) => AccountError::Unauthorized,
        other => other,
    }
}

fn claims_user_id(auth: &AuthUser) -> Result<Uuid, AppError> {
    Uuid::parse_str(&auth.0.sub).map_err(|_| AccountError::Unauthorized.into())
}

/// Token from the JSON body, falling back to the refresh cookie.
fn refresh_token_from(headers: &HeaderMap, body: &Bytes) -> Result<Option<String>, AppError> {
    let request: RefreshRequest = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    Ok(request
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| cookie_value(headers, REFRESH_TOKEN_COOKIE)))
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/registration",
    tag = TAG,
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; tokens unless e-mail verification is mandatory", body = LoginResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn register<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    // Validation runs in the service, after the signup-open check.
    let Json(input) = payload?;
    let ctx = RequestContext::from_headers(&headers);
    let username = input.username.clone().unwrap_or_default();

    let user = match state.registration.register(&ctx, input).await {
        Ok(user) => user,
        Err(e) => {
            AuditEvent::new(AuditAction::Register, AuditOutcome::Failure)
                .with_ip(ctx.ip)
                .with_user_agent(ctx.user_agent)
                .with_details(json!({ "username": username, "reason": e.to_string() }))
                .log();
            return Err(e.into());
        }
    };

    AuditEvent::new(AuditAction::Register, AuditOutcome::Success)
        .with_user(user.id.to_string())
        .with_resource(format!("user:{}", user.id))
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    if state.registration.config().email_verification == EmailVerification::Mandatory {
        return Ok((
            StatusCode::CREATED,
            Json(DetailResponse::new("Verification e-mail sent.")),
        )
            .into_response());
    }

    let (response, _) = state.issue_login(user).await?;
    Ok((StatusCode::CREATED, response).into_response())
}

/// Confirm an e-mail address
#[utoipa::path(
    post,
    path = "/registration/verify-email",
    tag = TAG,
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Address verified", body = DetailResponse),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn verify_email<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<VerifyEmailRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    let address = state.service.confirm_email(&input.key).await?;

    let ctx = RequestContext::from_headers(&headers);
    AuditEvent::new(AuditAction::EmailVerify, AuditOutcome::Success)
        .with_user(address.user_id.to_string())
        .with_resource(format!("email_address:{}", address.id))
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    Ok(Json(DetailResponse::new("ok")))
}

/// Log in with a username or e-mail and a password
#[utoipa::path(
    post,
    path = "/login",
    tag = TAG,
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse)
    )
)]
async fn login<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let ctx = RequestContext::from_headers(&headers);

    let user = match state.service.authenticate(&input).await {
        Ok(user) => user,
        Err(e) => {
            AuditEvent::new(AuditAction::Login, AuditOutcome::Failure)
                .with_ip(ctx.ip)
                .with_user_agent(ctx.user_agent)
                .with_details(json!({
                    "username": input.username,
                    "email": input.email,
                    "reason": e.to_string(),
                }))
                .log();
            return Err(e.into());
        }
    };

    let (response, user_id) = state.issue_login(user).await?;

    AuditEvent::new(AuditAction::Login, AuditOutcome::Success)
        .with_user(user_id)
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    Ok(response)
}

/// Revoke the presented tokens and clear the cookies
#[utoipa::path(
    post,
    path = "/logout",
    tag = TAG,
    request_body(content = Option<RefreshRequest>),
    responses((status = 200, description = "Logged out", body = DetailResponse))
)]
async fn logout<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let presented = [
        extract_token_from_request(&headers),
        refresh_token_from(&headers, &body)?,
    ];

    let mut user_id = None;
    for token in presented.into_iter().flatten() {
        let Ok(claims) = state.jwt_auth.verify_token(&token) else {
            continue;
        };
        state.jwt_auth.revoke(&claims).await.map_err(token_error)?;
        user_id = Some(claims.sub);
    }

    let ctx = RequestContext::from_headers(&headers);
    let mut event = AuditEvent::new(AuditAction::Logout, AuditOutcome::Success)
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent);
    if let Some(user_id) = user_id {
        event = event.with_user(user_id);
    }
    event.log();

    Ok((
        AppendHeaders(clear_token_cookies(state.secure_cookies())?),
        Json(DetailResponse::new("Successfully logged out.")),
    )
        .into_response())
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/token/refresh",
    tag = TAG,
    request_body(content = Option<RefreshRequest>),
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, response = UnauthorizedResponse)
    )
)]
async fn refresh<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let token = refresh_token_from(&headers, &body)?.ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".to_string())
    })?;

    let claims = state.jwt_auth.authenticate(&token, TokenKind::Refresh).await?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AccountError::Unauthorized)?;
    let user = state
        .service
        .get_user(user_id)
        .await
        .map_err(token_owner_error)?;
    if !user.is_active {
        return Err(AccountError::InactiveAccount.into());
    }

    let access_token = state
        .jwt_auth
        .issue_token(&claims.sub, &user.username, &user.email, TokenKind::Access)
        .await
        .map_err(token_error)?;

    let ctx = RequestContext::from_headers(&headers);
    AuditEvent::new(AuditAction::TokenRefresh, AuditOutcome::Success)
        .with_user(claims.sub)
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    Ok((
        AppendHeaders([access_cookie(&access_token, state.secure_cookies())?]),
        Json(RefreshResponse {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
        }),
    )
        .into_response())
}

/// Authenticated user
#[utoipa::path(
    get,
    path = "/user",
    tag = TAG,
    responses(
        (status = 200, description = "Current user", body = UserDetails),
        (status = 401, response = UnauthorizedResponse)
    ),
    security(("bearer" = []))
)]
async fn current_user<R: UserRepository>(
    State(state): State<AuthState<R>>,
    auth: AuthUser,
) -> Result<Json<UserDetails>, AppError> {
    let id = claims_user_id(&auth)?;
    let user = state
        .service
        .get_user(id)
        .await
        .map_err(token_owner_error)?;

    Ok(Json(user.into()))
}

/// Replace the authenticated user's writable fields
#[utoipa::path(
    put,
    path = "/user",
    tag = TAG,
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Updated user", body = UserDetails),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 409, response = ConflictResponse)
    ),
    security(("bearer" = []))
)]
async fn replace_current_user<R: UserRepository>(
    state: State<AuthState<R>>,
    headers: HeaderMap,
    auth: AuthUser,
    input: ValidatedJson<UpdateUser>,
) -> Result<Json<UserDetails>, AppError> {
    update_current_user(state, headers, auth, input).await
}

/// Update some of the authenticated user's fields
#[utoipa::path(
    patch,
    path = "/user",
    tag = TAG,
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Updated user", body = UserDetails),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 409, response = ConflictResponse)
    ),
    security(("bearer" = []))
)]
async fn update_current_user<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    auth: AuthUser,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> Result<Json<UserDetails>, AppError> {
    let id = claims_user_id(&auth)?;
    let user = state.service.update_user(id, input).await?;

    let ctx = RequestContext::from_headers(&headers);
    AuditEvent::new(AuditAction::UserUpdate, AuditOutcome::Success)
        .with_user(id.to_string())
        .with_resource(format!("user:{}", id))
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    Ok(Json(user.into()))
}

/// Change the authenticated user's password
#[utoipa::path(
    post,
    path = "/password/change",
    tag = TAG,
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = DetailResponse),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse)
    ),
    security(("bearer" = []))
)]
async fn change_password<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    auth: AuthUser,
    ValidatedJson(input): ValidatedJson<PasswordChangeRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    let id = claims_user_id(&auth)?;
    let result = state.service.change_password(id, input).await;

    let ctx = RequestContext::from_headers(&headers);
    let outcome = if result.is_ok() {
        AuditOutcome::Success
    } else {
        AuditOutcome::Failure
    };
    AuditEvent::new(AuditAction::PasswordChange, outcome)
        .with_user(id.to_string())
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    result?;
    Ok(Json(DetailResponse::new("New password has been saved.")))
}

/// Send a password reset e-mail
#[utoipa::path(
    post,
    path = "/password/reset",
    tag = TAG,
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset e-mail sent when the address is known", body = DetailResponse),
        (status = 400, response = BadRequestValidationResponse)
    )
)]
async fn password_reset<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<PasswordResetRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    let ctx = RequestContext::from_headers(&headers);
    state.service.request_password_reset(&ctx, &input.email).await?;

    AuditEvent::new(AuditAction::PasswordReset, AuditOutcome::Success)
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    Ok(Json(DetailResponse::new("Password reset e-mail has been sent.")))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/password/reset/confirm",
    tag = TAG,
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password reset", body = DetailResponse),
        (status = 400, response = BadRequestResponse)
    )
)]
async fn password_reset_confirm<R: UserRepository>(
    State(state): State<AuthState<R>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<PasswordResetConfirmRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    let uid = input.uid.clone();
    let result = state.service.confirm_password_reset(input).await;

    let ctx = RequestContext::from_headers(&headers);
    let outcome = if result.is_ok() {
        AuditOutcome::Success
    } else {
        AuditOutcome::Failure
    };
    AuditEvent::new(AuditAction::PasswordResetConfirm, outcome)
        .with_resource(format!("user:{}", uid))
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    result?;
    Ok(Json(DetailResponse::new(
        "Password has been reset with the new password.",
    )))
}

/// Create auth router
pub fn auth_router<R: UserRepository + 'static>(state: AuthState<R>) -> Router {
    let protected = Router::new()
        .route(
            "/user",
            get(current_user::<R>)
                .put(replace_current_user::<R>)
                .patch(update_current_user::<R>),
        )
        .route("/password/change", post(change_password::<R>))
        .route_layer(middleware::from_fn_with_state(
            state.jwt_auth.clone(),
            jwt_auth_middleware,
        ));

    Router::new()
        .route("/registration", post(register::<R>))
        .route("/registration/verify-email", post(verify_email::<R>))
        .route("/login", post(login::<R>))
        .route("/logout", post(logout::<R>))
        .route("/token/refresh", post(refresh::<R>))
        .route("/password/reset", post(password_reset::<R>))
        .route("/password/reset/confirm", post(password_reset_confirm::<R>))
        .merge(protected)
        .with_state(state)
}
