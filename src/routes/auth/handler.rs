use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::{
    AppState,
    account::{
        decode_verification_token, issue_verification_token, resolve_nickname, validate_password,
        validate_profile_picture_url,
    },
    database::{NewUser, UserEntity, UserRepository},
    error::AppError,
    routes::user::{MAX_BIO_LENGTH, MAX_NAME_LENGTH, UserResponse, check_length},
    utils::{
        burn_password_check, expiry_after, generate_token, hash_password, success_to_api_response,
        verify_password,
    },
};

use super::model::{LoginRequest, LoginResponse, RegisterRequest, VerifyEmailResponse};

pub(crate) fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if !email.validate_email() {
        return Err(AppError::validation(
            "email",
            "invalid_format",
            "email address is not valid",
        ));
    }
    Ok(email)
}

/// Validate a registration body, store the account and send the
/// verification email. New accounts start `Anonymous` and unverified.
pub(crate) async fn create_account(
    state: &AppState,
    req: RegisterRequest,
) -> Result<UserEntity, AppError> {
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;
    check_length("first_name", req.first_name.as_deref(), MAX_NAME_LENGTH)?;
    check_length("last_name", req.last_name.as_deref(), MAX_NAME_LENGTH)?;
    check_length("bio", req.bio.as_deref(), MAX_BIO_LENGTH)?;
    let profile_picture_url = req
        .profile_picture_url
        .as_deref()
        .map(validate_profile_picture_url)
        .transpose()?
        .map(String::from);

    let pool = &state.pool;
    if UserRepository::email_exists(pool, &email).await? {
        return Err(AppError::Conflict("email already exists"));
    }

    let nickname = resolve_nickname(req.nickname, |candidate| async move {
        UserRepository::nickname_exists(pool, &candidate)
            .await
            .map_err(AppError::from)
    })
    .await?;

    let password_hash = hash_password(&req.password)?;
    let id = Uuid::new_v4();
    let issued = issue_verification_token(
        id,
        &state.config.jwt_secret,
        state.config.verification_token_expiration(),
    )?;

    let user = UserRepository::create(
        pool,
        NewUser {
            id,
            email,
            nickname,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            bio: req.bio,
            profile_picture_url,
            role: crate::account::Role::Anonymous,
            verification_token: issued.digest,
        },
    )
    .await?;

    let link = state.config.verification_link(&user.id, &issued.token);
    if let Err(e) = state
        .mailer
        .send_verification_email(&user.email, &user.nickname, &link)
        .await
    {
        tracing::warn!(user_id = %user.id, "failed to send verification email: {}", e);
    }

    Ok(user)
}

/// Register a new account
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = create_account(&state, req).await?;
    Ok((
        StatusCode::CREATED,
        success_to_api_response(UserResponse::from(user)),
    ))
}

/// Exchange email and password for a session token.
///
/// Unknown emails, wrong passwords and unverified accounts all answer with
/// the same credential error. A locked account is only reported as locked
/// to a caller who got the password right.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_lowercase();
    let Some(user) = UserRepository::find_by_email(&state.pool, &email).await? else {
        burn_password_check(&req.password);
        return Err(AppError::InvalidCredentials);
    };

    let now = Utc::now();
    let password_ok = verify_password(&req.password, &user.password_hash)?;

    if user.is_locked_at(now) {
        tracing::info!(user_id = %user.id, "login attempt on locked account");
        return Err(if password_ok {
            AppError::AccountLocked
        } else {
            AppError::InvalidCredentials
        });
    }

    if !password_ok {
        UserRepository::record_login_failure(
            &state.pool,
            user.id,
            state.config.max_login_attempts,
            expiry_after(now, state.config.lockout_duration()),
        )
        .await?;
        return Err(AppError::InvalidCredentials);
    }

    if !user.email_verified {
        tracing::info!(user_id = %user.id, "login refused for unverified account");
        return Err(AppError::InvalidCredentials);
    }

    UserRepository::record_login_success(&state.pool, user.id).await?;

    let (access_token, expires_at) = generate_token(user.id, user.role, &state.config)?;
    Ok(success_to_api_response(LoginResponse {
        access_token,
        token_type: "bearer",
        expires_at,
    }))
}

/// Redeem an email verification token
#[axum::debug_handler]
pub async fn verify_email(
    State(state): State<AppState>,
    Path((user_id, token)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let claims = decode_verification_token(&token, &state.config.jwt_secret)?;
    UserRepository::redeem_verification(&state.pool, user_id, &token, &claims).await?;

    Ok(success_to_api_response(VerifyEmailResponse {
        message: "email verified",
    }))
}
