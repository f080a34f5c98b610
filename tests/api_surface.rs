use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use foundling::auth::ensure_admin_user;
use foundling::AppState;

#[path = "util.rs"]
mod util;

const PASSWORD: &str = "router-password";

async fn app() -> Result<(TempDir, AppState, Router)> {
    let pool = util::memory_pool().await?;
    ensure_admin_user(&pool, "admin", PASSWORD).await?;
    let (dir, uploads) = util::temp_uploads();
    let state = AppState::new(pool, uploads);
    let router = foundling::router(state.clone());
    Ok((dir, state, router))
}

async fn json_body(response: axum::response::Response) -> Result<serde_json::Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

async fn login_cookie(router: &Router) -> Result<String> {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(
                    "{{\"username\":\"admin\",\"password\":\"{PASSWORD}\"}}"
                )))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie set")
        .to_str()?
        .to_string();
    Ok(set_cookie.split(';').next().unwrap().to_string())
}

#[tokio::test]
async fn admin_routes_demand_a_live_admin_session() -> Result<()> {
    let (_guard, state, router) = app().await?;

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/api/admin/items").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await?;
    assert_eq!(body["code"], "AUTH/UNAUTHORIZED");

    // a live session without the admin role is forbidden, not unauthorized
    let token = state.sessions.create("visitor", "viewer");
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/items")
                .header(header::COOKIE, format!("foundling_session={token}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let cookie = login_cookie(&router).await?;
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/stats")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["total_items"], 0);
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() -> Result<()> {
    let (_guard, _state, router) = app().await?;
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    "{\"username\":\"admin\",\"password\":\"nope\"}",
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn public_get_maps_statuses_to_http() -> Result<()> {
    let (_guard, state, router) = app().await?;
    let pending = util::seed_item(
        &state.pool, "Pending", "Misc", "Hall", "2025-01-01", "pending", 1,
    )
    .await?;

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/api/items/4242").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await?;
    assert_eq!(body["code"], "DB/NOT_FOUND");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/items/{pending}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // the same id is visible with an admin session
    let cookie = login_cookie(&router).await?;
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/items/{pending}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn multipart_submission_returns_created_pending() -> Result<()> {
    let (_guard, _state, router) = app().await?;

    let boundary = "------------------------foundlingtest";
    let mut body = String::new();
    for (name, value) in [
        ("title", "Blue Backpack"),
        ("description", "Navy, broken zip"),
        ("category", "Bags"),
        ("location_found", "Library"),
        ("date_found", "2025-01-10"),
        ("reporter_name", "A"),
        ("reporter_email", "a@x.com"),
    ] {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/items")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await?;
    assert_eq!(body["status"], "pending");
    assert!(body["id"].as_i64().unwrap() > 0);
    Ok(())
}

#[tokio::test]
async fn oversized_upload_is_rejected_without_orphan_files() -> Result<()> {
    let (guard, state, router) = app().await?;

    let boundary = "------------------------foundlingtest";
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in [
        ("title", "Projector"),
        ("description", "Left in lecture hall"),
        ("category", "Electronics"),
        ("location_found", "Hall B"),
        ("date_found", "2025-02-02"),
        ("reporter_name", "B"),
        ("reporter_email", "b@x.com"),
    ] {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"photo\"; \
             filename=\"big.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(util::PNG_BYTES);
    body.extend_from_slice(&vec![0u8; 6 * 1024 * 1024]);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/items")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    assert_eq!(
        std::fs::read_dir(guard.path())?.count(),
        0,
        "no file may be written for a rejected upload"
    );
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(rows, 0, "no row inserted either");
    Ok(())
}

#[tokio::test]
async fn invalid_claim_status_is_a_bad_request() -> Result<()> {
    let (_guard, state, router) = app().await?;
    let item_id = util::seed_item(
        &state.pool, "Umbrella", "Misc", "Hall", "2025-01-01", "approved", 1,
    )
    .await?;
    sqlx::query(
        "INSERT INTO claims (item_id, claimant_name, claimant_email, message, status, created_at) \
         VALUES (?, 'n', 'n@x.com', 'mine', 'new', 1)",
    )
    .bind(item_id)
    .execute(&state.pool)
    .await?;

    let cookie = login_cookie(&router).await?;
    let response = router
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/admin/claims/1")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"status\":\"escalated\"}"))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert_eq!(body["code"], "CLAIMS/INVALID_STATUS");
    Ok(())
}

#[tokio::test]
async fn admin_routes_rate_limit_per_client() -> Result<()> {
    let (_guard, _state, router) = app().await?;

    let mut last = StatusCode::OK;
    for _ in 0..61 {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/admin/items")
                    .header("x-forwarded-for", "9.9.9.9")
                    .body(Body::empty())?,
            )
            .await?;
        last = response.status();
    }
    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);

    // a different client key still has budget
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/admin/items")
                .header("x-forwarded-for", "8.8.8.8")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
