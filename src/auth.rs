use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::state::AppState;
use crate::time::now_ms;
use crate::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "foundling_session";
/// Sessions die after this much inactivity.
pub const SESSION_TTL_MS: i64 = 4 * 60 * 60 * 1000;

pub const ROLE_ADMIN: &str = "admin";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            AppError::new("AUTH/HASH_FAILED", "Could not hash password")
                .with_cause(AppError::from(e.to_string()))
        })?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub role: String,
    last_seen_ms: i64,
}

/// Process-local session store. Fine for a single-instance deployment; a
/// horizontally scaled one would need an external store instead.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, username: &str, role: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let session = Session {
            username: username.to_string(),
            role: role.to_string(),
            last_seen_ms: now_ms(),
        };
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.clone(), session);
        token
    }

    /// Look up a token, expiring it when the inactivity window has passed and
    /// refreshing the window otherwise.
    pub fn authenticate(&self, token: &str) -> Option<Session> {
        self.authenticate_at(token, now_ms())
    }

    fn authenticate_at(&self, token: &str, now: i64) -> Option<Session> {
        let mut sessions = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(token) {
            Some(session) if now - session.last_seen_ms <= SESSION_TTL_MS => {
                session.last_seen_ms = now;
                Some(session.clone())
            }
            Some(_) => {
                sessions.remove(token);
                tracing::info!(target = "foundling", event = "session_expired");
                None
            }
            None => None,
        }
    }

    pub fn revoke(&self, token: &str) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token);
    }
}

/// Seed the admin account if it does not exist yet. Never overwrites an
/// existing user; the only later mutation is change-password.
pub async fn ensure_admin_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> anyhow::Result<()> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let hash = hash_password(password).map_err(anyhow::Error::from)?;
    sqlx::query(
        "INSERT INTO users (username, password_hash, role, created_at) \
         VALUES (?, ?, ?, ?) ON CONFLICT(username) DO NOTHING",
    )
    .bind(username)
    .bind(&hash)
    .bind(ROLE_ADMIN)
    .bind(now_ms())
    .execute(pool)
    .await?;
    tracing::info!(target = "foundling", event = "admin_seeded");
    Ok(())
}

/// Verify credentials and open a session. Unknown users and wrong passwords
/// are indistinguishable to the caller.
pub async fn login(
    pool: &SqlitePool,
    sessions: &SessionStore,
    username: &str,
    password: &str,
) -> AppResult<String> {
    let invalid = || AppError::new("AUTH/INVALID_CREDENTIALS", "Invalid username or password");

    let row = sqlx::query("SELECT username, password_hash, role FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::from(e).with_context("operation", "login"))?
        .ok_or_else(invalid)?;

    let stored_hash: String = row.try_get("password_hash").map_err(AppError::from)?;
    if !verify_password(password, &stored_hash) {
        tracing::warn!(target = "foundling", event = "login_failed", username = %username);
        return Err(invalid());
    }

    let role: String = row.try_get("role").map_err(AppError::from)?;
    let token = sessions.create(username, &role);
    tracing::info!(target = "foundling", event = "login_ok", username = %username);
    Ok(token)
}

pub async fn change_password(
    pool: &SqlitePool,
    username: &str,
    current_password: &str,
    new_password: &str,
) -> AppResult<()> {
    let new_password = new_password.trim();
    if new_password.is_empty() {
        return Err(
            AppError::new("VALIDATION/MISSING_FIELD", "A required field is missing")
                .with_context("field", "new_password"),
        );
    }

    let stored_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::from(e).with_context("operation", "change_password"))?;
    let stored_hash = stored_hash
        .ok_or_else(|| AppError::new("AUTH/INVALID_CREDENTIALS", "Invalid username or password"))?;

    if !verify_password(current_password, &stored_hash) {
        return Err(AppError::new(
            "AUTH/INVALID_CREDENTIALS",
            "Invalid username or password",
        ));
    }

    let hash = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password_hash = ? WHERE username = ?")
        .bind(&hash)
        .bind(username)
        .execute(pool)
        .await
        .map_err(|e| AppError::from(e).with_context("operation", "change_password"))?;
    tracing::info!(target = "foundling", event = "password_changed", username = %username);
    Ok(())
}

/// Extractor gating admin routes: resolves the session cookie against the
/// store and requires the admin role. Missing or expired sessions are 401,
/// a live session without the role is 403.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| AppError::new("AUTH/UNAUTHORIZED", "Login required"))?;

        let session = state
            .sessions
            .authenticate(&token)
            .ok_or_else(|| AppError::new("AUTH/UNAUTHORIZED", "Session expired or unknown"))?;

        if session.role != ROLE_ADMIN {
            return Err(AppError::new("AUTH/FORBIDDEN", "Admin role required"));
        }

        Ok(AdminSession {
            username: session.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn sessions_expire_after_inactivity() {
        let store = SessionStore::new();
        let token = store.create("admin", ROLE_ADMIN);

        let now = now_ms();
        assert!(store.authenticate_at(&token, now).is_some());
        // activity refreshes the window
        let later = now + SESSION_TTL_MS - 1;
        assert!(store.authenticate_at(&token, later).is_some());
        assert!(store
            .authenticate_at(&token, later + SESSION_TTL_MS - 1)
            .is_some());
        // past the window the session is gone for good
        let expired = later + 3 * SESSION_TTL_MS;
        assert!(store.authenticate_at(&token, expired).is_none());
        assert!(store.authenticate_at(&token, later + SESSION_TTL_MS).is_none());
    }

    #[test]
    fn revoked_tokens_stop_authenticating() {
        let store = SessionStore::new();
        let token = store.create("admin", ROLE_ADMIN);
        store.revoke(&token);
        assert!(store.authenticate(&token).is_none());
    }

    #[test]
    fn tokens_are_unique() {
        let store = SessionStore::new();
        let a = store.create("admin", ROLE_ADMIN);
        let b = store.create("admin", ROLE_ADMIN);
        assert_ne!(a, b);
    }
}
