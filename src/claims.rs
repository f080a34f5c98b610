use sqlx::{Row, SqlitePool};

use crate::items::required_field;
use crate::model::{Claim, ClaimStatus, ClaimWithItem, ItemStatus};
use crate::search::ADMIN_LIST_CAP;
use crate::time::now_ms;
use crate::uploads::UploadStore;
use crate::{AppError, AppResult};

pub const CLAIMANT_NAME_CAP: usize = 80;
pub const CLAIMANT_EMAIL_CAP: usize = 120;
pub const STUDENT_ID_CAP: usize = 40;
pub const MESSAGE_CAP: usize = 1500;

#[derive(Debug, Clone, Default)]
pub struct RawClaimFields {
    pub claimant_name: Option<String>,
    pub claimant_email: Option<String>,
    pub student_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClaimFields {
    pub claimant_name: String,
    pub claimant_email: String,
    pub student_id: Option<String>,
    pub message: String,
}

pub fn validate_claim_fields(raw: &RawClaimFields) -> AppResult<ClaimFields> {
    let student_id = raw
        .student_id
        .as_deref()
        .map(|s| crate::items::clip(s, STUDENT_ID_CAP))
        .filter(|s| !s.is_empty());
    Ok(ClaimFields {
        claimant_name: required_field(raw.claimant_name.as_deref(), "claimant_name", CLAIMANT_NAME_CAP)?,
        claimant_email: required_field(
            raw.claimant_email.as_deref(),
            "claimant_email",
            CLAIMANT_EMAIL_CAP,
        )?,
        student_id,
        message: required_field(raw.message.as_deref(), "message", MESSAGE_CAP)?,
    })
}

/// Create a claim against a listed item. An absent item and an archived item
/// look the same to the public: not found. A proof file stored before a
/// validation failure is deleted before the error returns.
pub async fn submit_claim(
    pool: &SqlitePool,
    uploads: &UploadStore,
    item_id: i64,
    raw: &RawClaimFields,
    proof_filename: Option<String>,
) -> AppResult<Claim> {
    let remove_proof = |name: Option<String>| async move {
        if let Some(name) = name {
            uploads.remove(&name).await;
        }
    };

    let status: Option<String> = sqlx::query_scalar("SELECT status FROM items WHERE id = ?")
        .bind(item_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::from(e).with_context("operation", "submit_claim_item_lookup"))?;

    let claimable = match status.as_deref().and_then(ItemStatus::parse) {
        None => false,
        Some(ItemStatus::Archived) => false,
        Some(_) => true,
    };
    if !claimable {
        remove_proof(proof_filename).await;
        return Err(AppError::not_found("item", item_id));
    }

    let fields = match validate_claim_fields(raw) {
        Ok(fields) => fields,
        Err(err) => {
            remove_proof(proof_filename).await;
            return Err(err);
        }
    };

    let res = sqlx::query(
        "INSERT INTO claims \
           (item_id, claimant_name, claimant_email, student_id, message, \
            proof_filename, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(item_id)
    .bind(&fields.claimant_name)
    .bind(&fields.claimant_email)
    .bind(&fields.student_id)
    .bind(&fields.message)
    .bind(&proof_filename)
    .bind(ClaimStatus::New.as_str())
    .bind(now_ms())
    .execute(pool)
    .await
    .map_err(|e| AppError::from(e).with_context("operation", "submit_claim"))?;

    let id = res.last_insert_rowid();
    tracing::info!(
        target = "foundling",
        event = "claim_submitted",
        id = id,
        item_id = item_id
    );

    get_claim(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("claim", id))
}

pub async fn get_claim(pool: &SqlitePool, id: i64) -> AppResult<Option<Claim>> {
    let row = sqlx::query("SELECT * FROM claims WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            AppError::from(e)
                .with_context("operation", "get_claim")
                .with_context("id", id.to_string())
        })?;
    row.as_ref().map(Claim::from_row).transpose()
}

/// Admin triage list: claims joined with their item's title and status,
/// newest first, optional exact status filter, capped.
pub async fn admin_list_claims(
    pool: &SqlitePool,
    status: Option<&str>,
) -> AppResult<Vec<ClaimWithItem>> {
    let mut sql = String::from(
        "SELECT c.*, i.title AS item_title, i.status AS item_status \
         FROM claims c JOIN items i ON i.id = c.item_id",
    );
    if status.is_some() {
        sql.push_str(" WHERE c.status = ?");
    }
    sql.push_str(" ORDER BY c.created_at DESC, c.id DESC LIMIT ?");

    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status.to_string());
    }
    let rows = query
        .bind(ADMIN_LIST_CAP)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::from(e).with_context("operation", "admin_list_claims"))?;

    rows.iter()
        .map(|row| {
            let claim = Claim::from_row(row)?;
            let item_title: String = row.try_get("item_title").map_err(AppError::from)?;
            let item_status: String = row.try_get("item_status").map_err(AppError::from)?;
            let item_status = ItemStatus::parse(&item_status).ok_or_else(|| {
                AppError::new("DB/BAD_STATUS", "Stored item status is not recognized")
            })?;
            Ok(ClaimWithItem {
                claim,
                item_title,
                item_status,
            })
        })
        .collect()
}

/// Set a claim's triage status. Every enumerated status is reachable from
/// every other; an unknown status string is rejected without touching the
/// row, and an unknown claim id is an explicit not-found.
pub async fn admin_set_claim_status(
    pool: &SqlitePool,
    id: i64,
    status: &str,
) -> AppResult<Claim> {
    let status = ClaimStatus::parse(status).ok_or_else(|| {
        AppError::new("CLAIMS/INVALID_STATUS", "Unknown claim status")
            .with_context("status", status.to_string())
    })?;

    let res = sqlx::query("UPDATE claims SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| {
            AppError::from(e)
                .with_context("operation", "claim_set_status")
                .with_context("id", id.to_string())
        })?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found("claim", id));
    }

    tracing::info!(
        target = "foundling",
        event = "claim_status_set",
        id = id,
        status = status.as_str()
    );

    get_claim(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("claim", id))
}
