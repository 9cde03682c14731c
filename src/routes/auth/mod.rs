mod handler;
mod model;

pub(crate) use handler::create_account;
pub use handler::{login, register, verify_email};
pub use model::{LoginRequest, LoginResponse, RegisterRequest, VerifyEmailResponse};
