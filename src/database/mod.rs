// Identity store: row types and the repository that owns every SQL statement.

pub mod models {
    pub mod user;
}
pub mod repositories {
    pub mod user;
}

pub use models::user::{NewUser, ProfileChanges, UserEntity};
pub use repositories::user::UserRepository;
