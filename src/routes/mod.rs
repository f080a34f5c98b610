use std::collections::HashMap;

use axum::extract::multipart::Multipart;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::SESSION_COOKIE;
use crate::model::Requester;
use crate::rate_limit::require_rate_limit;
use crate::state::AppState;
use crate::uploads::MAX_UPLOAD_BYTES;
use crate::{AppError, AppResult};

mod admin;
mod auth;
mod claims;
mod items;

/// Multipart bodies get headroom above the per-file cap; the upload manager
/// enforces the real 5 MiB ceiling per attachment.
const BODY_LIMIT: usize = 8 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/items", get(admin::list_items))
        .route(
            "/items/:id",
            patch(admin::update_item).delete(admin::delete_item),
        )
        .route("/claims", get(admin::list_claims))
        .route("/claims/:id", patch(admin::update_claim))
        .route("/stats", get(admin::stats))
        .route("/change-password", post(admin::change_password))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_rate_limit,
        ));

    let api = Router::new()
        .route("/items", get(items::list_items).post(items::submit_item))
        .route("/items/:id", get(items::get_item))
        .route("/items/:id/claim", post(claims::submit_claim))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(state.uploads.base().to_path_buf()))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve who is asking from the session cookie, if any. Anything short of
/// a live admin session reads as public.
fn requester_from(state: &AppState, jar: &CookieJar) -> Requester {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Requester::Public;
    };
    match state.sessions.authenticate(cookie.value()) {
        Some(session) if session.role == crate::auth::ROLE_ADMIN => Requester::Admin,
        _ => Requester::Public,
    }
}

pub(crate) struct UploadedFile {
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Drain a multipart submission into its text fields plus at most one
/// attachment from `file_field`. The attachment is buffered against the
/// per-file cap so an oversized body is rejected before anything is written.
pub(crate) async fn read_submission(
    mut multipart: Multipart,
    file_field: &str,
) -> AppResult<(HashMap<String, String>, Option<UploadedFile>)> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        AppError::new("UPLOADS/MALFORMED", "Could not read the multipart body")
            .with_cause(AppError::from(e.to_string()))
    };

    let mut texts = HashMap::new();
    let mut file = None;

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == file_field {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let mut bytes: Vec<u8> = Vec::new();
            while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                    return Err(crate::uploads::UploadError::TooLarge.into());
                }
                bytes.extend_from_slice(&chunk);
            }
            // an empty part is what browsers send for "no file chosen"
            if !bytes.is_empty() {
                file = Some(UploadedFile {
                    name: file_name,
                    content_type,
                    bytes,
                });
            }
        } else {
            let value = field.text().await.map_err(malformed)?;
            texts.insert(name, value);
        }
    }

    Ok((texts, file))
}
