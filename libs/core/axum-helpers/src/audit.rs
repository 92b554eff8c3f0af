//! Audit log for security-relevant account actions.
//!
//! Events go to the `audit` tracing target so they can be routed separately.
//!
//! ```ignore
//! AuditEvent::new(AuditAction::Login, AuditOutcome::Success)
//!     .with_user(user.id.to_string())
//!     .with_ip(extract_ip_from_headers(&headers))
//!     .with_user_agent(extract_user_agent(&headers))
//!     .log();
//! ```

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    #[serde(rename = "account.register")]
    Register,
    #[serde(rename = "account.login")]
    Login,
    #[serde(rename = "account.logout")]
    Logout,
    #[serde(rename = "account.token_refresh")]
    TokenRefresh,
    #[serde(rename = "account.password_change")]
    PasswordChange,
    #[serde(rename = "account.password_reset")]
    PasswordReset,
    #[serde(rename = "account.password_reset_confirm")]
    PasswordResetConfirm,
    #[serde(rename = "account.email_verify")]
    EmailVerify,
    #[serde(rename = "user.create")]
    UserCreate,
    #[serde(rename = "user.update")]
    UserUpdate,
    #[serde(rename = "user.delete")]
    UserDelete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "account.register",
            Self::Login => "account.login",
            Self::Logout => "account.logout",
            Self::TokenRefresh => "account.token_refresh",
            Self::PasswordChange => "account.password_change",
            Self::PasswordReset => "account.password_reset",
            Self::PasswordResetConfirm => "account.password_reset_confirm",
            Self::EmailVerify => "account.email_verify",
            Self::UserCreate => "user.create",
            Self::UserUpdate => "user.update",
            Self::UserDelete => "user.delete",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Acting user, when known
    pub user_id: Option<String>,
    pub action: AuditAction,
    /// Affected resource, e.g. `user:0190...`
    pub resource: Option<String>,
    pub outcome: AuditOutcome,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            user_id: None,
            action,
            resource: None,
            outcome,
            ip_address: None,
            user_agent: None,
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    /// Emit on the `audit` target.
    pub fn log(self) {
        tracing::info!(
            target: "audit",
            user_id = self.user_id,
            action = self.action.as_str(),
            resource = self.resource,
            outcome = ?self.outcome,
            ip = self.ip_address,
            user_agent = self.user_agent,
            details = ?self.details,
            "{}",
            serde_json::to_string(&self).unwrap_or_else(|_| "Failed to serialize audit event".to_string())
        );
    }
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`.
pub fn extract_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));

        assert_eq!(extract_ip_from_headers(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_action_serializes_as_dotted_name() {
        let event = AuditEvent::new(AuditAction::PasswordChange, AuditOutcome::Success)
            .with_user("42")
            .with_resource("user:42");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["action"], AuditAction::PasswordChange.as_str());
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["resource"], "user:42");
    }
}
