use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::account::{Role, validate_nickname, validate_profile_picture_url};
use crate::database::{ProfileChanges, UserEntity};
use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_BIO_LENGTH: usize = 500;

/// Hypermedia link attached to responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub rel: String,
    pub href: String,
    pub method: String,
}

impl Link {
    fn new(rel: &str, href: String, method: &str) -> Self {
        Self {
            rel: rel.to_string(),
            href,
            method: method.to_string(),
        }
    }
}

/// Account as returned to clients. Secrets never leave the store.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl From<UserEntity> for UserResponse {
    fn from(user: UserEntity) -> Self {
        let is_locked = user.is_locked_at(Utc::now());
        Self {
            id: user.id,
            email: user.email,
            nickname: user.nickname,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            profile_picture_url: user.profile_picture_url,
            role: user.role,
            email_verified: user.email_verified,
            is_locked,
            locked_until: user.locked_until,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
            links: Vec::new(),
        }
    }
}

impl UserResponse {
    pub fn with_links(mut self, base_uri: &str) -> Self {
        self.links = user_links(base_uri, self.id);
        self
    }
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial profile update. Leaving a field out keeps it; sending `null` for
/// an optional field clears it. The nickname can be changed but not cleared.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub profile_picture_url: Option<Option<String>>,
}

impl UpdateProfileRequest {
    /// Validate every supplied field and turn the request into store changes.
    pub fn into_changes(self) -> Result<ProfileChanges, AppError> {
        if let Some(nickname) = &self.nickname {
            validate_nickname(nickname)?;
        }
        check_length("first_name", set_value(&self.first_name), MAX_NAME_LENGTH)?;
        check_length("last_name", set_value(&self.last_name), MAX_NAME_LENGTH)?;
        check_length("bio", set_value(&self.bio), MAX_BIO_LENGTH)?;
        let profile_picture_url = match self.profile_picture_url {
            Some(Some(raw)) => Some(Some(String::from(validate_profile_picture_url(&raw)?))),
            Some(None) => Some(None),
            None => None,
        };

        let changes = ProfileChanges {
            nickname: self.nickname,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
            profile_picture_url,
        };
        if changes.is_empty() {
            return Err(AppError::validation(
                "body",
                "no_changes",
                "at least one field must be provided",
            ));
        }
        Ok(changes)
    }
}

fn set_value(field: &Option<Option<String>>) -> Option<&str> {
    field.as_ref()?.as_deref()
}

pub fn check_length(field: &'static str, value: Option<&str>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::validation(
            field,
            "too_long",
            format!("{} must be at most {} characters", field, max),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfilePictureRequest {
    pub profile_picture_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListUsersQuery {
    /// `(skip, limit)` with defaults applied and the page size clamped.
    pub fn window(&self) -> Result<(i64, i64), AppError> {
        let skip = self.skip.unwrap_or(0);
        if skip < 0 {
            return Err(AppError::validation(
                "skip",
                "negative",
                "skip must not be negative",
            ));
        }
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Ok((skip, limit))
    }
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub size: usize,
    pub links: Vec<Link>,
}

pub fn user_links(base_uri: &str, id: Uuid) -> Vec<Link> {
    let href = format!("{}/users/{}", base_uri.trim_end_matches('/'), id);
    vec![
        Link::new("self", href.clone(), "GET"),
        Link::new("update", href.clone(), "PUT"),
        Link::new("delete", href.clone(), "DELETE"),
        Link::new("change_role", format!("{}/role", href), "PUT"),
    ]
}

pub fn pagination_links(base_uri: &str, skip: i64, limit: i64, total: i64) -> Vec<Link> {
    let base = format!("{}/users", base_uri.trim_end_matches('/'));
    let page = |skip: i64| format!("{}?skip={}&limit={}", base, skip, limit);

    let last_skip = if total > 0 {
        ((total - 1) / limit) * limit
    } else {
        0
    };

    let mut links = vec![
        Link::new("self", page(skip), "GET"),
        Link::new("first", page(0), "GET"),
        Link::new("last", page(last_skip), "GET"),
    ];
    if skip + limit < total {
        links.push(Link::new("next", page(skip + limit), "GET"));
    }
    if skip > 0 {
        links.push(Link::new("prev", page((skip - limit).max(0)), "GET"));
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rels(links: &[Link]) -> Vec<&str> {
        links.iter().map(|l| l.rel.as_str()).collect()
    }

    #[test]
    fn middle_page_has_next_and_prev() {
        let links = pagination_links("/api", 10, 10, 35);
        assert_eq!(rels(&links), ["self", "first", "last", "next", "prev"]);
        assert_eq!(links[2].href, "/api/users?skip=30&limit=10");
        assert_eq!(links[3].href, "/api/users?skip=20&limit=10");
        assert_eq!(links[4].href, "/api/users?skip=0&limit=10");
    }

    #[test]
    fn single_page_has_no_neighbours() {
        let links = pagination_links("/api/", 0, 10, 4);
        assert_eq!(rels(&links), ["self", "first", "last"]);
        assert_eq!(links[2].href, "/api/users?skip=0&limit=10");
    }

    #[test]
    fn empty_listing_points_last_at_start() {
        let links = pagination_links("/api", 0, 10, 0);
        assert_eq!(links[2].href, "/api/users?skip=0&limit=10");
    }

    #[test]
    fn window_defaults_and_clamps() {
        let q = ListUsersQuery {
            skip: None,
            limit: None,
        };
        assert_eq!(q.window().unwrap(), (0, DEFAULT_PAGE_SIZE));

        let q = ListUsersQuery {
            skip: Some(5),
            limit: Some(10_000),
        };
        assert_eq!(q.window().unwrap(), (5, MAX_PAGE_SIZE));

        let q = ListUsersQuery {
            skip: Some(-1),
            limit: Some(0),
        };
        assert!(q.window().is_err());
    }

    #[test]
    fn user_links_cover_management_actions() {
        let id = Uuid::nil();
        let links = user_links("/api", id);
        assert_eq!(rels(&links), ["self", "update", "delete", "change_role"]);
        assert!(links[3].href.ends_with("/role"));
    }

    #[test]
    fn empty_profile_update_is_rejected() {
        let err = UpdateProfileRequest::default().into_changes().unwrap_err();
        assert!(matches!(err, AppError::Validation { rule: "no_changes", .. }));
    }

    #[test]
    fn profile_update_validates_each_field() {
        let bad_picture = UpdateProfileRequest {
            profile_picture_url: Some(Some("https://cdn.example.com/me.gif".into())),
            ..Default::default()
        };
        assert!(matches!(
            bad_picture.into_changes().unwrap_err(),
            AppError::Validation {
                field: "profile_picture_url",
                ..
            }
        ));

        let long_bio = UpdateProfileRequest {
            bio: Some(Some("x".repeat(MAX_BIO_LENGTH + 1))),
            ..Default::default()
        };
        assert!(matches!(
            long_bio.into_changes().unwrap_err(),
            AppError::Validation { field: "bio", .. }
        ));

        let ok = UpdateProfileRequest {
            nickname: Some("new_name".into()),
            ..Default::default()
        }
        .into_changes()
        .unwrap();
        assert_eq!(ok.nickname.as_deref(), Some("new_name"));
    }

    #[test]
    fn null_clears_and_absent_keeps() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"bio":null,"first_name":"Ada"}"#).unwrap();
        let changes = req.into_changes().unwrap();

        assert_eq!(changes.bio, Some(None));
        assert_eq!(changes.first_name, Some(Some("Ada".to_string())));
        assert_eq!(changes.last_name, None);
        assert_eq!(changes.profile_picture_url, None);
        assert!(!changes.is_empty());
    }

    #[test]
    fn clearing_the_picture_skips_url_validation() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"profile_picture_url":null}"#).unwrap();
        assert_eq!(req.into_changes().unwrap().profile_picture_url, Some(None));
    }
}
