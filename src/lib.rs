use std::sync::Arc;

use config::Config;
use notify::Mailer;
use sqlx::PgPool;

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod result;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub mailer: Arc<dyn Mailer>,
}
