use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::account::{Forbidden, NicknameError, PasswordRule, PictureUrlError, TokenRejection};
use crate::utils::{ApiResponse, error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        rule: &'static str,
        message: String,
    },
    #[error("{0}")]
    Conflict(&'static str),
    #[error("incorrect credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("account not found")]
    NotFound,
    #[error("too many requests, retry in {0} seconds")]
    RateLimited(u64),
    #[error("invalid or expired token")]
    InvalidToken(TokenRejection),
    #[error("account locked")]
    AccountLocked,
    #[error("{0}")]
    ResourceExhausted(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: &'static str,
    pub rule: &'static str,
}

impl AppError {
    pub fn validation(field: &'static str, rule: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            rule,
            message: message.into(),
        }
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        AppError::Internal(e.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            AppError::AccountLocked => StatusCode::LOCKED,
            AppError::ResourceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> i32 {
        match self {
            AppError::Validation { .. } => error_codes::VALIDATION_ERROR,
            AppError::Conflict(_) => error_codes::USER_EXISTS,
            AppError::InvalidCredentials | AppError::Unauthorized => error_codes::AUTH_FAILED,
            AppError::Forbidden => error_codes::PERMISSION_DENIED,
            AppError::NotFound => error_codes::NOT_FOUND,
            AppError::RateLimited(_) => error_codes::RATE_LIMIT,
            AppError::InvalidToken(_) => error_codes::INVALID_TOKEN,
            AppError::AccountLocked => error_codes::ACCOUNT_LOCKED,
            AppError::ResourceExhausted(_) => error_codes::RESOURCE_EXHAUSTED,
            AppError::Database(_) | AppError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        let constraint = e
            .as_database_error()
            .and_then(|db| db.constraint())
            .map(str::to_owned);

        match constraint.as_deref() {
            Some("users_email_key") => AppError::Conflict("email already exists"),
            Some("users_nickname_key") => AppError::Conflict("nickname already exists"),
            _ => match e {
                sqlx::Error::RowNotFound => AppError::NotFound,
                other => AppError::Database(other),
            },
        }
    }
}

impl From<PasswordRule> for AppError {
    fn from(rule: PasswordRule) -> Self {
        AppError::validation("password", rule.code(), rule.to_string())
    }
}

impl From<PictureUrlError> for AppError {
    fn from(e: PictureUrlError) -> Self {
        AppError::validation("profile_picture_url", e.code(), e.to_string())
    }
}

impl From<NicknameError> for AppError {
    fn from(e: NicknameError) -> Self {
        match e {
            NicknameError::Taken => AppError::Conflict("nickname already exists"),
            NicknameError::Exhausted { .. } => AppError::ResourceExhausted(e.to_string()),
            NicknameError::InvalidLength | NicknameError::InvalidCharacters => {
                AppError::validation("nickname", e.code(), e.to_string())
            }
        }
    }
}

impl From<TokenRejection> for AppError {
    fn from(cause: TokenRejection) -> Self {
        AppError::InvalidToken(cause)
    }
}

impl From<Forbidden> for AppError {
    fn from(_: Forbidden) -> Self {
        AppError::Forbidden
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::internal(format!("password hashing failed: {}", e))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(format!("token signing failed: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        match self {
            AppError::Validation {
                field,
                rule,
                message,
            } => {
                let body = ApiResponse {
                    code,
                    msg: message,
                    resp_data: Some(ValidationDetail { field, rule }),
                };
                (status, axum::Json(body)).into_response()
            }
            AppError::InvalidToken(ref cause) => {
                tracing::debug!(%cause, "verification token rejected");
                (status, error_to_api_response::<()>(code, self.to_string())).into_response()
            }
            AppError::Database(ref e) => {
                tracing::error!("database error: {:?}", e);
                (
                    status,
                    error_to_api_response::<()>(code, "internal server error".into()),
                )
                    .into_response()
            }
            AppError::Internal(ref e) => {
                tracing::error!("internal error: {}", e);
                (
                    status,
                    error_to_api_response::<()>(code, "internal server error".into()),
                )
                    .into_response()
            }
            other => (status, error_to_api_response::<()>(code, other.to_string())).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_name_the_rule() {
        let (status, body) = body_json(PasswordRule::MissingUppercase.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
        assert_eq!(body["resp_data"]["field"], "password");
        assert_eq!(body["resp_data"]["rule"], "missing_uppercase");
    }

    #[tokio::test]
    async fn token_errors_do_not_reveal_their_cause() {
        for cause in [
            TokenRejection::Expired,
            TokenRejection::Mismatch,
            TokenRejection::AlreadyVerified,
        ] {
            let (status, body) = body_json(cause.into()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["msg"], "invalid or expired token");
            assert!(body.get("resp_data").is_none());
        }
    }

    #[tokio::test]
    async fn forbidden_is_generic() {
        let (status, body) = body_json(Forbidden.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "forbidden");
    }

    #[tokio::test]
    async fn internal_details_stay_in_the_logs() {
        let (status, body) = body_json(AppError::internal("pool timed out")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["msg"], "internal server error");
    }

    #[test]
    fn nickname_errors_map_to_their_kind() {
        assert!(matches!(
            AppError::from(NicknameError::Exhausted { attempts: 10 }),
            AppError::ResourceExhausted(_)
        ));
        assert!(matches!(
            AppError::from(NicknameError::Taken),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(NicknameError::InvalidLength),
            AppError::Validation { field: "nickname", .. }
        ));
    }

    #[test]
    fn row_not_found_is_not_found() {
        assert!(matches!(
            AppError::from(sqlx::Error::RowNotFound),
            AppError::NotFound
        ));
    }
}
