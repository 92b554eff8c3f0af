use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use axum_helpers::{
    AuditAction, AuditEvent, AuditOutcome, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse, NotFoundResponse,
    },
};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::error::AccountResult;
use crate::models::{
    CreateUser, RequestContext, UpdateUser, UserFilter, UserList, UserRepresentation,
};
use crate::repository::UserRepository;
use crate::service::UserService;

pub const TAG: &str = "users";

/// OpenAPI documentation for the user resource
#[derive(OpenApi)]
#[openapi(
    paths(list_users, create_user, get_user, replace_user, update_user, delete_user),
    components(
        schemas(UserRepresentation, UserList, CreateUser, UpdateUser),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = TAG, description = "User records"))
)]
pub struct ApiDoc;

/// Create the users router with all HTTP endpoints
pub fn router<R: UserRepository + 'static>(service: UserService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{id}",
            get(get_user)
                .put(replace_user)
                .patch(update_user)
                .delete(delete_user),
        )
        .with_state(shared_service)
}

/// List users with optional filters
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    params(UserFilter),
    responses(
        (status = 200, description = "Paginated users", body = UserList),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_users<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Query(filter): Query<UserFilter>,
) -> AccountResult<Json<UserList>> {
    filter.validate()?;

    let limit = filter.limit;
    let offset = filter.offset;
    let (users, total) = service.list_users(filter).await?;

    Ok(Json(UserList {
        data: users
            .into_iter()
            .map(|u| service.representation(u))
            .collect(),
        total,
        limit,
        offset,
    }))
}

/// Create a user
#[utoipa::path(
    post,
    path = "",
    tag = TAG,
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserRepresentation),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> AccountResult<impl IntoResponse> {
    let ctx = RequestContext::from_headers(&headers);
    let user = service.create_user(&ctx, input).await?;

    AuditEvent::new(AuditAction::UserCreate, AuditOutcome::Success)
        .with_resource(format!("user:{}", user.id))
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .with_details(json!({ "username": user.username }))
        .log();

    Ok((StatusCode::CREATED, Json(service.representation(user))))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserRepresentation),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn get_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    UuidPath(id): UuidPath,
) -> AccountResult<Json<UserRepresentation>> {
    let user = service.get_user(id).await?;
    Ok(Json(service.representation(user)))
}

/// Replace every writable field of a user
#[utoipa::path(
    put,
    path = "/{id}",
    tag = TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = CreateUser,
    responses(
        (status = 200, description = "User replaced", body = UserRepresentation),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse)
    )
)]
async fn replace_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> AccountResult<Json<UserRepresentation>> {
    let user = service.replace_user(id, input).await?;
    audit_update(&headers, &user.id);
    Ok(Json(service.representation(user)))
}

/// Update some fields of a user
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserRepresentation),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse)
    )
)]
async fn update_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> AccountResult<Json<UserRepresentation>> {
    let user = service.update_user(id, input).await?;
    audit_update(&headers, &user.id);
    Ok(Json(service.representation(user)))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn delete_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
) -> AccountResult<impl IntoResponse> {
    service.delete_user(id).await?;

    let ctx = RequestContext::from_headers(&headers);
    AuditEvent::new(AuditAction::UserDelete, AuditOutcome::Success)
        .with_resource(format!("user:{}", id))
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();

    Ok(StatusCode::NO_CONTENT)
}

fn audit_update(headers: &HeaderMap, id: &Uuid) {
    let ctx = RequestContext::from_headers(headers);
    AuditEvent::new(AuditAction::UserUpdate, AuditOutcome::Success)
        .with_resource(format!("user:{}", id))
        .with_ip(ctx.ip)
        .with_user_agent(ctx.user_agent)
        .log();
}
