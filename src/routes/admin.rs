use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AdminSession;
use crate::claims;
use crate::items::{self, ItemAction, RawEditFields};
use crate::model::{Claim, ClaimWithItem, Item};
use crate::search;
use crate::state::AppState;
use crate::AppResult;

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
}

pub async fn list_items(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<AdminListQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let items =
        search::admin_list_items(&state.pool, query.status.as_deref(), query.q.as_deref()).await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct ItemPatchRequest {
    pub action: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location_found: Option<String>,
    #[serde(default)]
    pub date_found: Option<String>,
}

pub async fn update_item(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<i64>,
    Json(payload): Json<ItemPatchRequest>,
) -> AppResult<Json<Item>> {
    let fields = RawEditFields {
        title: payload.title,
        description: payload.description,
        category: payload.category,
        location_found: payload.location_found,
        date_found: payload.date_found,
    };
    let action = ItemAction::parse(&payload.action, fields)?;
    let item = items::apply_admin_action(&state.pool, id, action).await?;
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    items::delete_item(&state.pool, &state.uploads, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ClaimListQuery {
    pub status: Option<String>,
}

pub async fn list_claims(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<ClaimListQuery>,
) -> AppResult<Json<Vec<ClaimWithItem>>> {
    let claims = claims::admin_list_claims(&state.pool, query.status.as_deref()).await?;
    Ok(Json(claims))
}

#[derive(Debug, Deserialize)]
pub struct ClaimPatchRequest {
    pub status: String,
}

pub async fn update_claim(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<i64>,
    Json(payload): Json<ClaimPatchRequest>,
) -> AppResult<Json<Claim>> {
    let claim = claims::admin_set_claim_status(&state.pool, id, &payload.status).await?;
    Ok(Json(claim))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_items: i64,
    pub pending_items: i64,
    pub approved_items: i64,
    pub claimed_items: i64,
    pub archived_items: i64,
    pub total_claims: i64,
    pub new_claims: i64,
}

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<StatsResponse>> {
    let count_items = |status: Option<&'static str>| {
        let pool = state.pool.clone();
        async move {
            let result: Result<i64, sqlx::Error> = match status {
                Some(status) => {
                    sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE status = ?")
                        .bind(status)
                        .fetch_one(&pool)
                        .await
                }
                None => {
                    sqlx::query_scalar("SELECT COUNT(*) FROM items")
                        .fetch_one(&pool)
                        .await
                }
            };
            result.map_err(crate::AppError::from)
        }
    };

    let total_items = count_items(None).await?;
    let pending_items = count_items(Some("pending")).await?;
    let approved_items = count_items(Some("approved")).await?;
    let claimed_items = count_items(Some("claimed")).await?;
    let archived_items = count_items(Some("archived")).await?;

    let total_claims: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claims")
        .fetch_one(&state.pool)
        .await
        .map_err(crate::AppError::from)?;
    let new_claims: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claims WHERE status = 'new'")
        .fetch_one(&state.pool)
        .await
        .map_err(crate::AppError::from)?;

    Ok(Json(StatsResponse {
        total_items,
        pending_items,
        approved_items,
        claimed_items,
        archived_items,
        total_claims,
        new_claims,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    admin: AdminSession,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    crate::auth::change_password(
        &state.pool,
        &admin.username,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
