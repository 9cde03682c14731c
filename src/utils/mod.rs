use std::sync::OnceLock;

use axum::Json;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Role;
use crate::config::Config;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// Spend the same bcrypt work as a real check when there is no account to
/// check against, so unknown emails answer as slowly as known ones.
pub fn burn_password_check(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY_HASH.get_or_init(|| hash_password("account-service-dummy").ok());
    if let Some(dummy) = dummy {
        let _ = verify_password(password, dummy);
    }
}

/// `now + ttl`, saturating at the latest representable instant.
pub fn expiry_after(now: DateTime<Utc>, ttl: std::time::Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Session token claims. Stateless: signature and `exp` decide validity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // account id
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

pub fn generate_token(
    account_id: Uuid,
    role: Role,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = expiry_after(now, config.jwt_expiration()).timestamp();

    let claims = Claims {
        sub: account_id,
        role,
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    tracing::debug!(account_id = %account_id, %role, "issued session token");
    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 0 on success, one of [`error_codes`] otherwise
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_data: Option<T>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const USER_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INVALID_TOKEN: i32 = 1006;
    pub const ACCOUNT_LOCKED: i32 = 1007;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const RESOURCE_EXHAUSTED: i32 = 5001;
}


#[cfg(test)]
mod tests {
    use super::test_support::config;
    use super::*;

    #[test]
    fn session_token_round_trips_subject_and_role() {
        let config = config();
        let id = Uuid::new_v4();
        let (token, expires_at) = generate_token(id, Role::Manager, &config).unwrap();

        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp, expires_at);
    }

    #[test]
    fn session_token_from_another_secret_is_rejected() {
        let mut other = config();
        other.jwt_secret = "someone-else".into();
        let (token, _) = generate_token(Uuid::new_v4(), Role::Admin, &other).unwrap();

        assert!(verify_token(&token, &config()).is_err());
    }

    #[test]
    fn expired_session_token_is_rejected() {
        let config = config();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Authenticated,
            exp: Utc::now().timestamp() - 3600,
            iat: Utc::now().timestamp() - 7200,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn verification_token_is_not_a_session_token() {
        let config = config();
        let issued = crate::account::issue_verification_token(
            Uuid::new_v4(),
            &config.jwt_secret,
            config.verification_token_expiration(),
        )
        .unwrap();

        assert!(verify_token(&issued.token, &config).is_err());
    }

    #[test]
    fn oversized_lifetime_saturates_instead_of_overflowing() {
        let now = Utc::now();
        let huge = std::time::Duration::from_secs(3_000_000_000 * 3600);
        assert_eq!(expiry_after(now, huge), DateTime::<Utc>::MAX_UTC);
        assert_eq!(
            expiry_after(now, std::time::Duration::from_secs(60)),
            now + TimeDelta::seconds(60)
        );

        let mut config = config();
        config.jwt_expiration_secs = 3_000_000_000 * 3600;
        let (token, expires_at) = generate_token(Uuid::new_v4(), Role::Admin, &config).unwrap();
        assert_eq!(expires_at, DateTime::<Utc>::MAX_UTC.timestamp());
        assert!(verify_token(&token, &config).is_ok());
    }

    #[test]
    fn hashes_and_verifies_passwords() {
        let hash = hash_password("Abc123!@").unwrap();
        assert_ne!(hash, "Abc123!@");
        assert!(verify_password("Abc123!@", &hash).unwrap());
        assert!(!verify_password("abc123!@", &hash).unwrap());
    }
}
