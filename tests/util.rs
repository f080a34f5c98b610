#![allow(dead_code)]

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

use foundling::claims::RawClaimFields;
use foundling::items::RawItemFields;
use foundling::uploads::UploadStore;

pub async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;").execute(&pool).await?;
    foundling::migrate::apply_migrations(&pool).await?;
    Ok(pool)
}

pub fn temp_uploads() -> (TempDir, UploadStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = UploadStore::new(dir.path());
    (dir, store)
}

pub fn item_fields() -> RawItemFields {
    RawItemFields {
        title: Some("Blue Backpack".into()),
        description: Some("Navy backpack with a broken zip".into()),
        category: Some("Bags".into()),
        location_found: Some("Library".into()),
        date_found: Some("2025-01-10".into()),
        reporter_name: Some("A".into()),
        reporter_email: Some("a@x.com".into()),
    }
}

pub fn claim_fields() -> RawClaimFields {
    RawClaimFields {
        claimant_name: Some("Jordan".into()),
        claimant_email: Some("jordan@campus.edu".into()),
        student_id: Some("s1234".into()),
        message: Some("The zip on the left side is broken".into()),
    }
}

/// Insert an item row directly, bypassing the submission path, for listing
/// and lifecycle fixtures.
pub async fn seed_item(
    pool: &SqlitePool,
    title: &str,
    category: &str,
    location: &str,
    date_found: &str,
    status: &str,
    created_at: i64,
) -> Result<i64> {
    let res = sqlx::query(
        "INSERT INTO items \
           (title, description, category, location_found, date_found, \
            photo_filename, status, reporter_name, reporter_email, created_at) \
         VALUES (?, ?, ?, ?, ?, NULL, ?, 'seed', 'seed@x.com', ?)",
    )
    .bind(title)
    .bind(format!("description of {title}"))
    .bind(category)
    .bind(location)
    .bind(date_found)
    .bind(status)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

pub const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
