use core_config::{ConfigError, Environment, FromEnv, env_bool, env_or_default};
use std::str::FromStr;

const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";

/// When new accounts must confirm their e-mail address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmailVerification {
    /// No confirmation mail is sent
    None,
    /// Confirmation mail is sent, login works without it
    #[default]
    Optional,
    /// Login is refused until the primary address is verified
    Mandatory,
}

impl EmailVerification {
    pub fn sends_confirmation(self) -> bool {
        !matches!(self, EmailVerification::None)
    }
}

impl FromStr for EmailVerification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(EmailVerification::None),
            "optional" => Ok(EmailVerification::Optional),
            "mandatory" => Ok(EmailVerification::Mandatory),
            other => Err(format!(
                "expected one of none, optional, mandatory, got '{}'",
                other
            )),
        }
    }
}

/// Account behavior shared by the registration, user and auth handlers.
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    pub email_verification: EmailVerification,
    /// Reject signups whose e-mail already belongs to a user
    pub unique_email: bool,
    /// Prefix of the `url` self-link, without trailing slash
    pub public_base_url: String,
    /// Set the `Secure` flag on token cookies
    pub secure_cookies: bool,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            email_verification: EmailVerification::default(),
            unique_email: true,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            secure_cookies: false,
        }
    }
}

impl AccountsConfig {
    pub fn with_email_verification(mut self, mode: EmailVerification) -> Self {
        self.email_verification = mode;
        self
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Absolute self-link of a user resource.
    pub fn user_url(&self, id: &uuid::Uuid) -> String {
        format!("{}/user/{}", self.public_base_url, id)
    }
}

impl FromEnv for AccountsConfig {
    /// - ACCOUNT_EMAIL_VERIFICATION: optional
    /// - ACCOUNT_UNIQUE_EMAIL: true
    /// - PUBLIC_BASE_URL: http://localhost:8080
    ///
    /// Cookies are `Secure` in production.
    fn from_env() -> Result<Self, ConfigError> {
        let email_verification = env_or_default("ACCOUNT_EMAIL_VERIFICATION", "optional")
            .parse()
            .map_err(|details| ConfigError::ParseError {
                key: "ACCOUNT_EMAIL_VERIFICATION".to_string(),
                details,
            })?;

        Ok(Self {
            email_verification,
            unique_email: env_bool("ACCOUNT_UNIQUE_EMAIL", true)?,
            public_base_url: env_or_default("PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            secure_cookies: Environment::from_env().use_https(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                "ACCOUNT_EMAIL_VERIFICATION",
                "ACCOUNT_UNIQUE_EMAIL",
                "PUBLIC_BASE_URL",
                "APP_ENV",
            ],
            || {
                let config = AccountsConfig::from_env().unwrap();
                assert_eq!(config.email_verification, EmailVerification::Optional);
                assert!(config.unique_email);
                assert_eq!(config.public_base_url, "http://localhost:8080");
                assert!(!config.secure_cookies);
            },
        );
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("ACCOUNT_EMAIL_VERIFICATION", Some("Mandatory")),
                ("ACCOUNT_UNIQUE_EMAIL", Some("false")),
                ("PUBLIC_BASE_URL", Some("https://accounts.example.com/")),
                ("APP_ENV", Some("production")),
            ],
            || {
                let config = AccountsConfig::from_env().unwrap();
                assert_eq!(config.email_verification, EmailVerification::Mandatory);
                assert!(!config.unique_email);
                assert_eq!(config.public_base_url, "https://accounts.example.com");
                assert!(config.secure_cookies);
            },
        );
    }

    #[test]
    fn test_invalid_verification_mode() {
        temp_env::with_var("ACCOUNT_EMAIL_VERIFICATION", Some("sometimes"), || {
            let err = AccountsConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("ACCOUNT_EMAIL_VERIFICATION"));
        });
    }

    #[test]
    fn test_user_url() {
        let config = AccountsConfig::default().with_public_base_url("https://api.example.com/");
        let id = uuid::Uuid::nil();
        assert_eq!(
            config.user_url(&id),
            "https://api.example.com/user/00000000-0000-0000-0000-000000000000"
        );
    }
}
