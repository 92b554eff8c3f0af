use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("A user with that username already exists.")]
    DuplicateUsername(String),

    #[error("A user is already registered with this e-mail address.")]
    DuplicateEmail(String),

    #[error("Unable to log in with provided credentials.")]
    InvalidCredentials,

    #[error("User account is disabled.")]
    InactiveAccount,

    #[error("E-mail is not verified.")]
    EmailNotVerified,

    #[error("Must include either \"username\" or \"email\" and \"password\".")]
    MissingIdentifier,

    #[error("The two password fields didn't match.")]
    PasswordMismatch,

    #[error("Your old password was entered incorrectly. Please enter it again.")]
    WrongPassword,

    #[error("Invalid value")]
    InvalidToken,

    #[error("Invalid or expired confirmation key")]
    InvalidKey,

    #[error("Signups are currently closed.")]
    SignupClosed,

    #[error("Authentication credentials were not provided.")]
    Unauthorized,

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AccountResult<T> = Result<T, AccountError>;

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            e @ (AccountError::DuplicateUsername(_) | AccountError::DuplicateEmail(_)) => {
                AppError::Conflict(e.to_string())
            }
            e @ (AccountError::InvalidCredentials
            | AccountError::InactiveAccount
            | AccountError::Unauthorized) => AppError::Unauthorized(e.to_string()),
            e @ (AccountError::EmailNotVerified
            | AccountError::MissingIdentifier
            | AccountError::PasswordMismatch
            | AccountError::WrongPassword
            | AccountError::InvalidToken) => AppError::BadRequest(e.to_string()),
            AccountError::InvalidKey => AppError::NotFound("Not found.".to_string()),
            e @ AccountError::SignupClosed => AppError::Forbidden(e.to_string()),
            AccountError::Validation(errors) => AppError::ValidationError(errors),
            AccountError::Database(e) => AppError::Database(e),
            AccountError::PasswordHash(msg) | AccountError::Internal(msg) => {
                AppError::InternalServerError(msg)
            }
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AccountError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (AccountError::DuplicateUsername("alice".into()), StatusCode::CONFLICT),
            (AccountError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AccountError::InactiveAccount, StatusCode::UNAUTHORIZED),
            (AccountError::EmailNotVerified, StatusCode::BAD_REQUEST),
            (AccountError::PasswordMismatch, StatusCode::BAD_REQUEST),
            (AccountError::InvalidKey, StatusCode::NOT_FOUND),
            (AccountError::SignupClosed, StatusCode::FORBIDDEN),
            (AccountError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_duplicate_username_message() {
        let err = AppError::from(AccountError::DuplicateUsername("alice".into()));
        assert_eq!(
            err.to_string(),
            "Conflict: A user with that username already exists."
        );
    }
}
