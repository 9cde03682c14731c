use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    account::{Operation, authorize, validate_password, validate_profile_picture_url},
    database::{ProfileChanges, UserEntity, UserRepository},
    error::AppError,
    middleware::Caller,
    routes::auth::{RegisterRequest, create_account},
    utils::{expiry_after, hash_password, success_to_api_response, verify_password},
};

use super::model::{
    ChangePasswordRequest, ChangePasswordResponse, ChangeRoleRequest, ListUsersQuery,
    ProfilePictureRequest, UpdateProfileRequest, UserListResponse, UserResponse,
    pagination_links,
};

async fn load(state: &AppState, id: Uuid) -> Result<UserEntity, AppError> {
    UserRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)
}

async fn apply_changes(
    state: &AppState,
    id: Uuid,
    changes: ProfileChanges,
) -> Result<UserEntity, AppError> {
    UserRepository::update_profile(&state.pool, id, &changes)
        .await?
        .ok_or(AppError::NotFound)
}

#[axum::debug_handler]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::ViewOwnProfile)?;
    let user = load(&state, caller.account_id()?).await?;
    Ok(success_to_api_response(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::UpdateOwnProfile)?;
    let changes = req.into_changes()?;
    let user = apply_changes(&state, caller.account_id()?, changes).await?;
    Ok(success_to_api_response(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn set_profile_picture(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<ProfilePictureRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::SetProfilePicture)?;
    let url = validate_profile_picture_url(&req.profile_picture_url)?;
    let changes = ProfileChanges {
        profile_picture_url: Some(Some(url.into())),
        ..Default::default()
    };
    let user = apply_changes(&state, caller.account_id()?, changes).await?;
    Ok(success_to_api_response(UserResponse::from(user)))
}

/// Change the caller's password. The current password must be supplied.
#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::ChangeOwnPassword)?;
    validate_password(&req.new_password)?;

    let user = load(&state, caller.account_id()?).await?;
    if !verify_password(&req.old_password, &user.password_hash)? {
        // guesses through a session count toward the same lockout as logins
        UserRepository::record_login_failure(
            &state.pool,
            user.id,
            state.config.max_login_attempts,
            expiry_after(Utc::now(), state.config.lockout_duration()),
        )
        .await?;
        return Err(AppError::InvalidCredentials);
    }

    let hash = hash_password(&req.new_password)?;
    let success = UserRepository::update_password(&state.pool, user.id, &hash).await?;
    if success {
        tracing::info!(user_id = %user.id, "password changed");
    }
    Ok(success_to_api_response(ChangePasswordResponse { success }))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::ListAccounts)?;
    let (skip, limit) = query.window()?;

    let total = UserRepository::count(&state.pool).await?;
    let users = UserRepository::list(&state.pool, skip, limit).await?;

    let base = state.config.api_base_uri.as_str();
    let items: Vec<UserResponse> = users
        .into_iter()
        .map(|u| UserResponse::from(u).with_links(base))
        .collect();

    Ok(success_to_api_response(UserListResponse {
        size: items.len(),
        page: skip / limit + 1,
        links: pagination_links(base, skip, limit, total),
        total,
        items,
    }))
}

/// Create an account on someone else's behalf. It goes through the same
/// validation and verification email as self-registration.
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::CreateAccount)?;
    let user = create_account(&state, req).await?;
    tracing::info!(created = %user.id, by = ?caller.account_id, "account created by staff");
    Ok((
        StatusCode::CREATED,
        success_to_api_response(UserResponse::from(user).with_links(&state.config.api_base_uri)),
    ))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::ViewAccount)?;
    let user = load(&state, id).await?;
    Ok(success_to_api_response(
        UserResponse::from(user).with_links(&state.config.api_base_uri),
    ))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::UpdateAccount)?;
    let changes = req.into_changes()?;
    let user = apply_changes(&state, id, changes).await?;
    Ok(success_to_api_response(
        UserResponse::from(user).with_links(&state.config.api_base_uri),
    ))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::DeleteAccount)?;
    if !UserRepository::delete(&state.pool, id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(deleted = %id, by = ?caller.account_id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Lift a login lockout before it expires on its own.
#[axum::debug_handler]
pub async fn unlock_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::UnlockAccount)?;
    let user = UserRepository::unlock(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(user_id = %id, by = ?caller.account_id, "account unlocked");
    Ok(success_to_api_response(
        UserResponse::from(user).with_links(&state.config.api_base_uri),
    ))
}

/// Reassign an account's role. Admin only.
#[axum::debug_handler]
pub async fn change_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(caller.role, Operation::ChangeRole)?;
    let user = UserRepository::set_role(&state.pool, id, req.role)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(user_id = %id, role = %user.role, "role changed");
    Ok(success_to_api_response(
        UserResponse::from(user).with_links(&state.config.api_base_uri),
    ))
}
