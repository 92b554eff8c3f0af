//! `Set-Cookie` values for the token cookies.

use super::jwt::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
use super::middleware::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::errors::AppError;
use axum::http::{HeaderName, HeaderValue, header};

fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> Result<HeaderValue, AppError> {
    let secure_flag = if secure { " Secure;" } else { "" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=Strict; Path=/; Max-Age={}",
        name, value, secure_flag, max_age
    );

    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::InternalServerError(format!("Failed to create cookie: {}", e)))
}

/// Access and refresh cookies, `HttpOnly` and `Secure` when `secure`.
pub fn token_cookies(
    access_token: &str,
    refresh_token: &str,
    secure: bool,
) -> Result<[(HeaderName, HeaderValue); 2], AppError> {
    Ok([
        (
            header::SET_COOKIE,
            cookie(ACCESS_TOKEN_COOKIE, access_token, ACCESS_TOKEN_TTL, secure)?,
        ),
        (
            header::SET_COOKIE,
            cookie(REFRESH_TOKEN_COOKIE, refresh_token, REFRESH_TOKEN_TTL, secure)?,
        ),
    ])
}

/// Only the access cookie, after a refresh.
pub fn access_cookie(access_token: &str, secure: bool) -> Result<(HeaderName, HeaderValue), AppError> {
    Ok((
        header::SET_COOKIE,
        cookie(ACCESS_TOKEN_COOKIE, access_token, ACCESS_TOKEN_TTL, secure)?,
    ))
}

/// Expire both token cookies.
pub fn clear_token_cookies(secure: bool) -> Result<[(HeaderName, HeaderValue); 2], AppError> {
    Ok([
        (header::SET_COOKIE, cookie(ACCESS_TOKEN_COOKIE, "", 0, secure)?),
        (header::SET_COOKIE, cookie(REFRESH_TOKEN_COOKIE, "", 0, secure)?),
    ])
}
