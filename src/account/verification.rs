//! Email verification: token issuance and the UNVERIFIED -> VERIFIED transition.
//!
//! A verification token is an HS256 JWT bound to one account and an expiry.
//! Only its SHA-256 digest is kept on the account row, and [`VerificationRecord::redeem`]
//! is the single place the transition is allowed to happen.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use super::role::Role;

pub const VERIFICATION_PURPOSE: &str = "email_verification";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    Unverified,
    Verified,
}

impl VerificationState {
    pub fn from_flag(verified: bool) -> Self {
        if verified {
            VerificationState::Verified
        } else {
            VerificationState::Unverified
        }
    }

    pub fn is_verified(self) -> bool {
        self == VerificationState::Verified
    }
}

/// Why a presented token was refused. Only ever logged; callers see one
/// undifferentiated "invalid or expired token".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("token could not be decoded or its signature is invalid")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token was issued for a different account")]
    WrongAccount,
    #[error("token does not match the stored token")]
    Mismatch,
    #[error("no token is pending for this account")]
    NotPending,
    #[error("account is already verified")]
    AlreadyVerified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationClaims {
    pub sub: Uuid,
    pub purpose: String,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued token together with the digest to persist.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub digest: String,
}

pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub fn issue_verification_token(
    account_id: Uuid,
    secret: &str,
    ttl: std::time::Duration,
) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = VerificationClaims {
        sub: account_id,
        purpose: VERIFICATION_PURPOSE.to_string(),
        jti: Uuid::new_v4(),
        iat: now.timestamp(),
        exp: crate::utils::expiry_after(now, ttl).timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(IssuedToken {
        digest: token_digest(&token),
        token,
    })
}

/// Check the signature and shape of a token. Expiry is left to
/// [`VerificationRecord::redeem`] so it is judged against a single clock.
pub fn decode_verification_token(
    token: &str,
    secret: &str,
) -> Result<VerificationClaims, TokenRejection> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let claims = decode::<VerificationClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("verification token rejected by decoder: {}", e);
        TokenRejection::Malformed
    })?
    .claims;

    if claims.purpose != VERIFICATION_PURPOSE {
        return Err(TokenRejection::Malformed);
    }
    Ok(claims)
}

/// The verification-relevant slice of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    pub account_id: Uuid,
    pub role: Role,
    pub state: VerificationState,
    pub token_digest: Option<String>,
}

impl VerificationRecord {
    /// Fire the UNVERIFIED -> VERIFIED transition.
    ///
    /// On success the stored token is cleared, the state becomes `Verified`
    /// and an `Anonymous` account is promoted to `Authenticated`. On failure
    /// the record is left untouched.
    pub fn redeem(
        &mut self,
        presented: &str,
        claims: &VerificationClaims,
        now: i64,
    ) -> Result<Role, TokenRejection> {
        if self.state.is_verified() || self.role == Role::Authenticated {
            return Err(TokenRejection::AlreadyVerified);
        }
        if claims.sub != self.account_id {
            return Err(TokenRejection::WrongAccount);
        }
        if claims.exp <= now {
            return Err(TokenRejection::Expired);
        }
        match &self.token_digest {
            None => return Err(TokenRejection::NotPending),
            Some(stored) if *stored != token_digest(presented) => {
                return Err(TokenRejection::Mismatch);
            }
            Some(_) => {}
        }

        self.token_digest = None;
        self.state = VerificationState::Verified;
        if self.role == Role::Anonymous {
            self.role = Role::Authenticated;
        }
        Ok(self.role)
    }
}
