use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::account::{Role, TokenRejection, VerificationClaims, VerificationState};
use crate::database::models::user::{NewUser, ProfileChanges, UserEntity};
use crate::error::AppError;

const USER_COLUMNS: &str = r#"
    id, email, nickname, password_hash, first_name, last_name, bio,
    profile_picture_url, role, email_verified, verification_token,
    failed_login_attempts, locked_until, last_login_at, created_at, updated_at
"#;

/// Identity store backed by the `users` table.
pub struct UserRepository;

impl UserRepository {
    /// Insert a new, unverified account. Unique indexes on email and nickname
    /// reject duplicates atomically.
    pub async fn create(pool: &PgPool, user: NewUser) -> Result<UserEntity, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO users (
                id, email, nickname, password_hash, first_name, last_name, bio,
                profile_picture_url, role, email_verified, verification_token
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, false, $10)
            RETURNING {USER_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.nickname)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.bio)
            .bind(&user.profile_picture_url)
            .bind(user.role)
            .bind(&user.verification_token)
            .fetch_one(pool)
            .await;

        match created {
            Ok(user) => {
                tracing::info!(user_id = %user.id, nickname = %user.nickname, "created account");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!("failed to create account {}: {:?}", user.email, e);
                Err(e)
            }
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserEntity>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(pool)
            .await
    }

    pub async fn nickname_exists(pool: &PgPool, nickname: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE nickname = $1)")
            .bind(nickname)
            .fetch_one(pool)
            .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }

    pub async fn list(pool: &PgPool, skip: i64, limit: i64) -> Result<Vec<UserEntity>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id OFFSET $1 LIMIT $2"
        );
        sqlx::query_as::<_, UserEntity>(&sql)
            .bind(skip)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Apply profile changes. Untouched fields keep their value; optional
    /// fields given as `Some(None)` are cleared.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE users
            SET nickname = COALESCE($2, nickname),
                first_name = CASE WHEN $3 THEN $4 ELSE first_name END,
                last_name = CASE WHEN $5 THEN $6 ELSE last_name END,
                bio = CASE WHEN $7 THEN $8 ELSE bio END,
                profile_picture_url = CASE WHEN $9 THEN $10 ELSE profile_picture_url END,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .bind(&changes.nickname)
            .bind(changes.first_name.is_some())
            .bind(changes.first_name.clone().flatten())
            .bind(changes.last_name.is_some())
            .bind(changes.last_name.clone().flatten())
            .bind(changes.bio.is_some())
            .bind(changes.bio.clone().flatten())
            .bind(changes.profile_picture_url.is_some())
            .bind(changes.profile_picture_url.clone().flatten())
            .fetch_optional(pool)
            .await
    }

    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_role(
        pool: &PgPool,
        id: Uuid,
        role: Role,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Count a failed login. Reaching `max_attempts` locks the account until
    /// `lock_until` and starts the count again. Returns whether the account
    /// is locked after this failure.
    pub async fn record_login_failure(
        pool: &PgPool,
        id: Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let locked = sqlx::query_scalar::<_, bool>(
            r#"
            UPDATE users
            SET failed_login_attempts = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN 0
                    ELSE failed_login_attempts + 1
                END,
                locked_until = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN $3
                    ELSE locked_until
                END
            WHERE id = $1
            RETURNING COALESCE(locked_until > now(), false)
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .bind(lock_until)
        .fetch_one(pool)
        .await?;

        if locked {
            tracing::warn!(user_id = %id, %lock_until, "account locked after repeated login failures");
        }
        Ok(locked)
    }

    pub async fn record_login_success(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, locked_until = NULL, last_login_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Lift a login lockout and reset the failure count.
    pub async fn unlock(pool: &PgPool, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, locked_until = NULL, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Redeem a verification token.
    ///
    /// The row is locked with `SELECT ... FOR UPDATE` for the whole
    /// read-check-clear, so two concurrent redemptions of the same token
    /// cannot both succeed.
    pub async fn redeem_verification(
        pool: &PgPool,
        id: Uuid,
        presented: &str,
        claims: &VerificationClaims,
    ) -> Result<UserEntity, AppError> {
        let mut tx = pool.begin().await?;

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let user = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            // an unknown account is reported like any other bad token
            .ok_or(AppError::InvalidToken(TokenRejection::WrongAccount))?;

        let mut record = user.verification_record();
        record.redeem(presented, claims, Utc::now().timestamp())?;

        let sql = format!(
            r#"
            UPDATE users
            SET email_verified = $2,
                verification_token = $3,
                role = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let verified = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .bind(record.state == VerificationState::Verified)
            .bind(&record.token_digest)
            .bind(record.role)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %id, role = %verified.role, "email verified");
        Ok(verified)
    }
}
