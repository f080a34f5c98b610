use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::items::{self, RawItemFields};
use crate::model::Item;
use crate::rate_limit::ClientKey;
use crate::search::{self, ItemPage, ItemQuery};
use crate::state::AppState;
use crate::{AppError, AppResult};

use super::{read_submission, requester_from};

pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<ItemPage>> {
    let page = search::list_items(&state.pool, &query).await?;
    Ok(Json(page))
}

pub async fn get_item(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> AppResult<Json<Item>> {
    let requester = requester_from(&state, &jar);
    let item = items::get_item_for(&state.pool, id, requester).await?;
    Ok(Json(item))
}

pub async fn submit_item(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if !state.rate_limiter.allow(&client) {
        return Err(AppError::new("RATE/LIMITED", "Too many requests, slow down"));
    }

    let (mut texts, file) = read_submission(multipart, "photo").await?;
    let raw = RawItemFields {
        title: texts.remove("title"),
        description: texts.remove("description"),
        category: texts.remove("category"),
        location_found: texts.remove("location_found"),
        date_found: texts.remove("date_found"),
        reporter_name: texts.remove("reporter_name"),
        reporter_email: texts.remove("reporter_email"),
    };

    let photo = match file {
        Some(file) => Some(
            state
                .uploads
                .store(file.name.as_deref(), file.content_type.as_deref(), &file.bytes)
                .await?,
        ),
        None => None,
    };

    let item = items::submit_item(&state.pool, &state.uploads, &raw, photo).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": item.id, "status": item.status })),
    ))
}
