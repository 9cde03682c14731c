mod handler;
mod model;

pub use handler::{
    change_password,
    change_role,
    create_user,
    delete_user,
    get_me,
    get_user,
    list_users,
    set_profile_picture,
    unlock_user,
    update_me,
    update_user,
};
pub use model::{
    ChangePasswordRequest, ChangePasswordResponse, ChangeRoleRequest, Link, ListUsersQuery,
    ProfilePictureRequest, UpdateProfileRequest, UserListResponse, UserResponse,
};
pub(crate) use model::{MAX_BIO_LENGTH, MAX_NAME_LENGTH, check_length};
