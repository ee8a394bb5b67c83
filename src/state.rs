//! Shared application state handed to every handler and middleware.

use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;

use crate::{
    config::Config,
    db::DbPool,
    security::{jwt::JwtKeys, rate_limit::RateLimiter},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub jwt: JwtKeys,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Self {
        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_expiry_hours);
        let rate_limiter = RateLimiter::new(
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            rate_limiter: Arc::new(rate_limiter),
        }
    }
}

// Lets handlers that only need the pool keep extracting `State<DbPool>`.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
