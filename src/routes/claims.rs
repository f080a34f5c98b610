use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::claims::{self, RawClaimFields};
use crate::rate_limit::ClientKey;
use crate::state::AppState;
use crate::{AppError, AppResult};

use super::read_submission;

pub async fn submit_claim(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    Path(item_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if !state.rate_limiter.allow(&client) {
        return Err(AppError::new("RATE/LIMITED", "Too many requests, slow down"));
    }

    let (mut texts, file) = read_submission(multipart, "proof").await?;
    let raw = RawClaimFields {
        claimant_name: texts.remove("claimant_name"),
        claimant_email: texts.remove("claimant_email"),
        student_id: texts.remove("student_id"),
        message: texts.remove("message"),
    };

    let proof = match file {
        Some(file) => Some(
            state
                .uploads
                .store(file.name.as_deref(), file.content_type.as_deref(), &file.bytes)
                .await?,
        ),
        None => None,
    };

    let claim = claims::submit_claim(&state.pool, &state.uploads, item_id, &raw, proof).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": claim.id, "status": claim.status })),
    ))
}
