// Account domain rules: validators, the role gate and the verification state machine.

pub mod nickname;
pub mod password;
pub mod picture;
pub mod role;
pub mod verification;

pub use nickname::{NicknameError, resolve_nickname, validate_nickname};
pub use password::{PasswordRule, validate_password};
pub use picture::{PictureUrlError, validate_profile_picture_url};
pub use role::{Forbidden, Operation, Role, authorize};
pub use verification::{
    TokenRejection, VerificationClaims, VerificationRecord, VerificationState, decode_verification_token,
    issue_verification_token,
};
