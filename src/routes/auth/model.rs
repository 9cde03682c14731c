use serde::{Deserialize, Serialize};

/// Registration and manager-created accounts share this body.
///
/// `nickname` is a strict option: a missing or `null` field means unset and a
/// nickname is generated; any string, including `""`, is taken as supplied.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub nickname: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_null_nickname_are_unset() {
        let missing: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"x"}"#).unwrap();
        assert_eq!(missing.nickname, None);

        let null: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"x","nickname":null}"#).unwrap();
        assert_eq!(null.nickname, None);
    }

    #[test]
    fn empty_nickname_is_supplied() {
        let empty: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"x","nickname":""}"#).unwrap();
        assert_eq!(empty.nickname.as_deref(), Some(""));
    }
}
