use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use crate::{AppState, account::Role, error::AppError, utils::verify_token};

/// Who is making the request, resolved from the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub account_id: Option<Uuid>,
    pub role: Role,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self {
            account_id: None,
            role: Role::Anonymous,
        }
    }

    /// Id of the signed-in account, or `Unauthorized` for anonymous callers.
    pub fn account_id(&self) -> Result<Uuid, AppError> {
        self.account_id.ok_or(AppError::Unauthorized)
    }
}

/// Resolve the caller and store it as a request extension.
///
/// No `Authorization` header means an anonymous caller; the role gate in each
/// handler decides what that caller may do. A header that is present but is
/// not a valid, unexpired bearer token is rejected outright.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let caller = if req.headers().contains_key(AUTHORIZATION) {
        let bearer = req
            .headers()
            .typed_get::<Authorization<Bearer>>()
            .ok_or(AppError::Unauthorized)?;

        let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
            tracing::debug!("session token rejected: {}", e);
            AppError::Unauthorized
        })?;

        Caller {
            account_id: Some(claims.sub),
            role: claims.role,
        }
    } else {
        Caller::anonymous()
    };

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
