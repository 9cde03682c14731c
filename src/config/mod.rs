use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub verification_token_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub max_login_attempts: i32,
    /// How long an account stays locked after too many failed logins.
    pub lockout_duration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    /// Origin used when building links sent by email, e.g. `https://accounts.example.com`.
    pub public_base_url: String,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub sender_email: Option<String>,
    pub sender_name: Option<String>,
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|v| !v.trim().is_empty())
            && self
                .sender_email
                .as_deref()
                .is_some_and(|v| !v.trim().is_empty())
    }
}

const DEFAULT_MAIL_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_LIFETIME_HOURS: u64 = 24 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Missing(#[from] env::VarError),
    #[error("{name} must be between 1 and {max} hours, got {value}")]
    OutOfRange {
        name: &'static str,
        value: String,
        max: u64,
    },
}

/// Parse a token lifetime such as `24h` or `24` into seconds. Unparsable
/// values fall back to `default_hours`; zero or more than a year is refused.
fn lifetime_secs(
    name: &'static str,
    raw: Option<&str>,
    default_hours: u64,
) -> Result<u64, ConfigError> {
    let hours = raw
        .and_then(|v| v.trim().trim_end_matches('h').parse::<u64>().ok())
        .unwrap_or(default_hours);
    if hours == 0 || hours > MAX_TOKEN_LIFETIME_HOURS {
        return Err(ConfigError::OutOfRange {
            name,
            value: raw.unwrap_or_default().to_string(),
            max: MAX_TOKEN_LIFETIME_HOURS,
        });
    }
    Ok(hours * 3600)
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let server_port = env::var("SERVER_PORT")?.parse().unwrap_or(3000);
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", server_port));

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            server_host: env::var("SERVER_HOST")?,
            server_port,
            jwt_expiration_secs: lifetime_secs(
                "JWT_EXPIRATION",
                env::var("JWT_EXPIRATION").ok().as_deref(),
                24,
            )?,
            verification_token_expiration_secs: lifetime_secs(
                "VERIFICATION_TOKEN_EXPIRATION",
                env::var("VERIFICATION_TOKEN_EXPIRATION").ok().as_deref(),
                24,
            )?,
            rate_limit_window_secs: parsed_var("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parsed_var("RATE_LIMIT_REQUESTS", 100),
            max_login_attempts: parsed_var("MAX_LOGIN_ATTEMPTS", 3),
            lockout_duration_secs: parsed_var("LOCKOUT_DURATION", 900),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            mail: MailConfig {
                api_url: env::var("MAIL_API_URL").unwrap_or_else(|_| DEFAULT_MAIL_API_URL.into()),
                api_key: env::var("MAIL_API_KEY").ok(),
                sender_email: env::var("MAIL_SENDER_EMAIL").ok(),
                sender_name: env::var("MAIL_SENDER_NAME").ok(),
            },
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn verification_token_expiration(&self) -> Duration {
        Duration::from_secs(self.verification_token_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_secs)
    }

    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_requests > 0
    }

    /// Absolute URL a user follows to redeem a verification token.
    pub fn verification_link(&self, account_id: &uuid::Uuid, token: &str) -> String {
        format!(
            "{}{}/auth/verify-email/{}/{}",
            self.public_base_url,
            self.api_base_uri.trim_end_matches('/'),
            account_id,
            token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/accounts".into(),
            redis_url: "redis://127.0.0.1/".into(),
            jwt_secret: "secret".into(),
            jwt_expiration_secs: 3600,
            verification_token_expiration_secs: 3600,
            rate_limit_window_secs: 60,
            rate_limit_requests: 0,
            max_login_attempts: 3,
            lockout_duration_secs: 900,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_base_uri: "/api/".into(),
            public_base_url: "https://accounts.example.com".into(),
            mail: MailConfig::default(),
        }
    }

    #[test]
    fn builds_verification_link() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            config().verification_link(&id, "abc"),
            "https://accounts.example.com/api/auth/verify-email/00000000-0000-0000-0000-000000000000/abc"
        );
    }

    #[test]
    fn mail_requires_key_and_sender() {
        let mut mail = MailConfig::default();
        assert!(!mail.is_configured());
        mail.api_key = Some("key".into());
        assert!(!mail.is_configured());
        mail.sender_email = Some("noreply@example.com".into());
        assert!(mail.is_configured());
    }

    #[test]
    fn token_lifetimes_accept_hour_suffix() {
        assert_eq!(lifetime_secs("JWT_EXPIRATION", Some("24h"), 1).unwrap(), 86_400);
        assert_eq!(lifetime_secs("JWT_EXPIRATION", Some(" 2 "), 1).unwrap(), 7_200);
        assert_eq!(lifetime_secs("JWT_EXPIRATION", None, 24).unwrap(), 86_400);
        assert_eq!(lifetime_secs("JWT_EXPIRATION", Some("soon"), 24).unwrap(), 86_400);
    }

    #[test]
    fn token_lifetimes_out_of_range_are_refused() {
        let huge = lifetime_secs("JWT_EXPIRATION", Some("3000000000h"), 24).unwrap_err();
        assert!(matches!(
            huge,
            ConfigError::OutOfRange {
                name: "JWT_EXPIRATION",
                ..
            }
        ));
        assert!(lifetime_secs("VERIFICATION_TOKEN_EXPIRATION", Some("0"), 24).is_err());
        assert!(lifetime_secs("JWT_EXPIRATION", Some("8760h"), 24).is_ok());
    }

    #[test]
    fn zero_requests_disables_rate_limiting() {
        assert!(!config().rate_limiting_enabled());
    }
}
