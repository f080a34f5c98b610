use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::model::{Item, ItemStatus, Requester};
use crate::time::now_ms;
use crate::uploads::UploadStore;
use crate::{AppError, AppResult};

pub const TITLE_CAP: usize = 120;
pub const DESCRIPTION_CAP: usize = 2000;
pub const CATEGORY_CAP: usize = 60;
pub const LOCATION_CAP: usize = 120;
pub const DATE_CAP: usize = 10;
pub const REPORTER_NAME_CAP: usize = 80;
pub const REPORTER_EMAIL_CAP: usize = 120;

/// Raw text fields as they arrive from a submission form, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawItemFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location_found: Option<String>,
    pub date_found: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_email: Option<String>,
}

/// The descriptive fields an admin edit overwrites. Reporter identity is set
/// at submission time and never edited.
#[derive(Debug, Clone, Default)]
pub struct RawEditFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location_found: Option<String>,
    pub date_found: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ItemFields {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location_found: String,
    pub date_found: String,
    pub reporter_name: String,
    pub reporter_email: String,
}

#[derive(Debug, Clone)]
pub struct EditFields {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location_found: String,
    pub date_found: String,
}

/// Admin moderation actions. `Edit` carries the replacement field values.
#[derive(Debug, Clone)]
pub enum ItemAction {
    Approve,
    Archive,
    MarkClaimed,
    Edit(RawEditFields),
}

impl ItemAction {
    pub fn parse(action: &str, fields: RawEditFields) -> AppResult<Self> {
        match action {
            "approve" => Ok(ItemAction::Approve),
            "archive" => Ok(ItemAction::Archive),
            "mark_claimed" => Ok(ItemAction::MarkClaimed),
            "edit" => Ok(ItemAction::Edit(fields)),
            other => Err(
                AppError::new("ITEMS/INVALID_ACTION", "Unknown moderation action")
                    .with_context("action", other.to_string()),
            ),
        }
    }
}

/// Trim, then cap at `cap` characters.
pub(crate) fn clip(value: &str, cap: usize) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() <= cap {
        trimmed.to_string()
    } else {
        trimmed.chars().take(cap).collect()
    }
}

pub(crate) fn required_field(
    value: Option<&str>,
    field: &'static str,
    cap: usize,
) -> AppResult<String> {
    let clipped = clip(value.unwrap_or_default(), cap);
    if clipped.is_empty() {
        return Err(
            AppError::new("VALIDATION/MISSING_FIELD", "A required field is missing")
                .with_context("field", field),
        );
    }
    Ok(clipped)
}

fn validated_date(value: Option<&str>) -> AppResult<String> {
    let date = required_field(value, "date_found", DATE_CAP)?;
    // Range filtering compares these strings lexicographically, so anything
    // that is not a real zero-padded YYYY-MM-DD date must be rejected here.
    if date.len() != 10 || NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        return Err(
            AppError::new("VALIDATION/BAD_DATE", "date_found must be a YYYY-MM-DD date")
                .with_context("field", "date_found")
                .with_context("value", date),
        );
    }
    Ok(date)
}

pub fn validate_item_fields(raw: &RawItemFields) -> AppResult<ItemFields> {
    Ok(ItemFields {
        title: required_field(raw.title.as_deref(), "title", TITLE_CAP)?,
        description: required_field(raw.description.as_deref(), "description", DESCRIPTION_CAP)?,
        category: required_field(raw.category.as_deref(), "category", CATEGORY_CAP)?,
        location_found: required_field(
            raw.location_found.as_deref(),
            "location_found",
            LOCATION_CAP,
        )?,
        date_found: validated_date(raw.date_found.as_deref())?,
        reporter_name: required_field(raw.reporter_name.as_deref(), "reporter_name", REPORTER_NAME_CAP)?,
        reporter_email: required_field(
            raw.reporter_email.as_deref(),
            "reporter_email",
            REPORTER_EMAIL_CAP,
        )?,
    })
}

pub fn validate_edit_fields(raw: &RawEditFields) -> AppResult<EditFields> {
    Ok(EditFields {
        title: required_field(raw.title.as_deref(), "title", TITLE_CAP)?,
        description: required_field(raw.description.as_deref(), "description", DESCRIPTION_CAP)?,
        category: required_field(raw.category.as_deref(), "category", CATEGORY_CAP)?,
        location_found: required_field(
            raw.location_found.as_deref(),
            "location_found",
            LOCATION_CAP,
        )?,
        date_found: validated_date(raw.date_found.as_deref())?,
    })
}

/// Create a pending item from a public submission. If validation fails after
/// a photo was already stored, the photo is deleted before the error returns
/// so no orphan file survives a rejected request.
pub async fn submit_item(
    pool: &SqlitePool,
    uploads: &UploadStore,
    raw: &RawItemFields,
    photo_filename: Option<String>,
) -> AppResult<Item> {
    let fields = match validate_item_fields(raw) {
        Ok(fields) => fields,
        Err(err) => {
            if let Some(name) = photo_filename {
                uploads.remove(&name).await;
            }
            return Err(err);
        }
    };

    let res = sqlx::query(
        "INSERT INTO items \
           (title, description, category, location_found, date_found, \
            photo_filename, status, reporter_name, reporter_email, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.category)
    .bind(&fields.location_found)
    .bind(&fields.date_found)
    .bind(&photo_filename)
    .bind(ItemStatus::Pending.as_str())
    .bind(&fields.reporter_name)
    .bind(&fields.reporter_email)
    .bind(now_ms())
    .execute(pool)
    .await
    .map_err(|e| AppError::from(e).with_context("operation", "submit_item"))?;

    let id = res.last_insert_rowid();
    tracing::info!(target = "foundling", event = "item_submitted", id = id);

    get_item(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("item", id))
}

pub async fn get_item(pool: &SqlitePool, id: i64) -> AppResult<Option<Item>> {
    let row = sqlx::query("SELECT * FROM items WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            AppError::from(e)
                .with_context("operation", "get_item")
                .with_context("id", id.to_string())
        })?;
    row.as_ref().map(Item::from_row).transpose()
}

/// Fetch one item on behalf of a requester. Items outside `approved` are
/// admin-only.
pub async fn get_item_for(pool: &SqlitePool, id: i64, requester: Requester) -> AppResult<Item> {
    let item = get_item(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("item", id))?;
    if item.status != ItemStatus::Approved && !requester.is_admin() {
        return Err(AppError::new("AUTH/FORBIDDEN", "This item is not public")
            .with_context("id", id.to_string()));
    }
    Ok(item)
}

/// Apply one admin moderation action and return the updated record.
pub async fn apply_admin_action(
    pool: &SqlitePool,
    id: i64,
    action: ItemAction,
) -> AppResult<Item> {
    let applied = match &action {
        ItemAction::Approve => set_status(pool, id, ItemStatus::Approved).await?,
        ItemAction::Archive => set_status(pool, id, ItemStatus::Archived).await?,
        ItemAction::MarkClaimed => set_status(pool, id, ItemStatus::Claimed).await?,
        ItemAction::Edit(raw) => {
            let fields = validate_edit_fields(raw)?;
            let res = sqlx::query(
                "UPDATE items SET title = ?, description = ?, category = ?, \
                 location_found = ?, date_found = ? WHERE id = ?",
            )
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(&fields.category)
            .bind(&fields.location_found)
            .bind(&fields.date_found)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| AppError::from(e).with_context("operation", "edit_item"))?;
            res.rows_affected() > 0
        }
    };

    if !applied {
        return Err(AppError::not_found("item", id));
    }

    let item = get_item(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("item", id))?;
    tracing::info!(
        target = "foundling",
        event = "item_admin_action",
        id = id,
        status = item.status.as_str()
    );
    Ok(item)
}

async fn set_status(pool: &SqlitePool, id: i64, status: ItemStatus) -> AppResult<bool> {
    let res = sqlx::query("UPDATE items SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| {
            AppError::from(e)
                .with_context("operation", "item_set_status")
                .with_context("status", status.as_str())
        })?;
    Ok(res.rows_affected() > 0)
}

/// Delete an item and everything hanging off it. Proof files and the photo
/// go first, best-effort; the row goes last so a crash mid-way can orphan
/// files but never leave a row pointing at a deleted file. Claim rows cascade
/// with the item row.
pub async fn delete_item(pool: &SqlitePool, uploads: &UploadStore, id: i64) -> AppResult<()> {
    let item = get_item(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("item", id))?;

    let proofs: Vec<String> = sqlx::query_scalar(
        "SELECT proof_filename FROM claims WHERE item_id = ? AND proof_filename IS NOT NULL",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::from(e).with_context("operation", "delete_item_proofs"))?;

    for proof in &proofs {
        uploads.remove(proof).await;
    }
    if let Some(photo) = &item.photo_filename {
        uploads.remove(photo).await;
    }

    sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| {
            AppError::from(e)
                .with_context("operation", "delete_item")
                .with_context("id", id.to_string())
        })?;

    tracing::info!(
        target = "foundling",
        event = "item_deleted",
        id = id,
        proof_files = proofs.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fields() -> RawItemFields {
        RawItemFields {
            title: Some("Blue Backpack".into()),
            description: Some("Left near the east entrance".into()),
            category: Some("Bags".into()),
            location_found: Some("Library".into()),
            date_found: Some("2025-01-10".into()),
            reporter_name: Some("A".into()),
            reporter_email: Some("a@x.com".into()),
        }
    }

    #[test]
    fn clip_trims_then_caps_at_char_boundary() {
        assert_eq!(clip("  hello  ", 10), "hello");
        assert_eq!(clip("abcdef", 3), "abc");
        assert_eq!(clip("ééééé", 3), "ééé");
    }

    #[test]
    fn validation_accepts_full_fields() {
        let fields = validate_item_fields(&full_fields()).expect("valid");
        assert_eq!(fields.title, "Blue Backpack");
        assert_eq!(fields.date_found, "2025-01-10");
    }

    #[test]
    fn validation_reports_the_missing_field() {
        let mut raw = full_fields();
        raw.category = Some("   ".into());
        let err = validate_item_fields(&raw).expect_err("blank category");
        assert_eq!(err.code(), "VALIDATION/MISSING_FIELD");
        assert_eq!(err.context().get("field").map(String::as_str), Some("category"));
    }

    #[test]
    fn validation_caps_long_values() {
        let mut raw = full_fields();
        raw.title = Some("t".repeat(500));
        let fields = validate_item_fields(&raw).expect("capped, not rejected");
        assert_eq!(fields.title.chars().count(), TITLE_CAP);
    }

    #[test]
    fn validation_rejects_malformed_dates() {
        for bad in ["10/01/2025", "2025-13-40", "yesterday", "2025-1-2"] {
            let mut raw = full_fields();
            raw.date_found = Some(bad.into());
            let err = validate_item_fields(&raw).expect_err(bad);
            assert_eq!(err.code(), "VALIDATION/BAD_DATE", "{bad}");
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = ItemAction::parse("promote", RawEditFields::default()).expect_err("unknown");
        assert_eq!(err.code(), "ITEMS/INVALID_ACTION");
        assert!(ItemAction::parse("approve", RawEditFields::default()).is_ok());
        assert!(ItemAction::parse("mark_claimed", RawEditFields::default()).is_ok());
    }
}
