use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;
use crate::time::now_ms;
use crate::AppError;

pub const RATE_LIMIT_PER_WINDOW: u32 = 60;
pub const RATE_WINDOW_MS: i64 = 60_000;

struct Window {
    started_ms: i64,
    count: u32,
}

/// Fixed-window counter per client key. Process-local, like the session
/// store; the window resets rather than slides.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_window: u32,
    window_ms: i64,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window_ms: i64) -> Self {
        Self {
            max_per_window,
            window_ms,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, now_ms())
    }

    fn allow_at(&self, key: &str, now: i64) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(key.to_string()).or_insert(Window {
            started_ms: now,
            count: 0,
        });
        if now - window.started_ms >= self.window_ms {
            window.started_ms = now;
            window.count = 0;
        }
        if window.count >= self.max_per_window {
            return false;
        }
        window.count += 1;
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT_PER_WINDOW, RATE_WINDOW_MS)
    }
}

fn client_key(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The key a request is throttled under: the first `X-Forwarded-For` hop
/// when present, the peer address otherwise.
pub struct ClientKey(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientKey(client_key(&parts.headers, &parts.extensions)))
    }
}

/// Middleware for abuse-prone routes. Applies before authentication: an
/// over-limit admin is throttled the same as an anonymous client.
pub async fn require_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(req.headers(), req.extensions());
    if !state.rate_limiter.allow(&key) {
        tracing::warn!(target = "foundling", event = "rate_limited", client = %key);
        return AppError::new("RATE/LIMITED", "Too many requests, slow down").into_response();
    }
    next.run(req).await
}
