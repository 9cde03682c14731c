use config::Config;
use email::Mailer;
use sqlx::PgPool;

pub mod account;
pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod middleware;
pub mod router;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let mailer = Mailer::new(config.mail.clone());
        Self {
            pool,
            config,
            mailer,
        }
    }
}
