use sqlx::SqlitePool;

use crate::auth::SessionStore;
use crate::rate_limit::RateLimiter;
use crate::uploads::UploadStore;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub uploads: UploadStore,
    pub sessions: SessionStore,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: SqlitePool, uploads: UploadStore) -> Self {
        Self {
            pool,
            uploads,
            sessions: SessionStore::new(),
            rate_limiter: RateLimiter::default(),
        }
    }
}
