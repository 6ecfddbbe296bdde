pub mod booking;
pub mod config;
pub mod earnings;
pub mod handlers;
pub mod messaging;
pub mod middleware;
pub mod models;
pub mod reviews;
pub mod routes;
pub mod sessions;

use std::sync::Arc;

use sqlx::PgPool;

use mentorlink_auth::JwtService;
use mentorlink_common::{Clock, RedisService};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_service: RedisService,
    pub jwt_service: JwtService,
    pub clock: Arc<dyn Clock>,
    pub config: AppConfig,
}
