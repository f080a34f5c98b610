use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::{AppError, AppResult};

/// Moderation lifecycle of a found-item report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Approved,
    Claimed,
    Archived,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Claimed => "claimed",
            ItemStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ItemStatus::Pending),
            "approved" => Some(ItemStatus::Approved),
            "claimed" => Some(ItemStatus::Claimed),
            "archived" => Some(ItemStatus::Archived),
            _ => None,
        }
    }
}

/// Triage lifecycle of a claim. Any status is reachable from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    New,
    InReview,
    Approved,
    Rejected,
    Resolved,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::New => "new",
            ClaimStatus::InReview => "in_review",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(ClaimStatus::New),
            "in_review" => Some(ClaimStatus::InReview),
            "approved" => Some(ClaimStatus::Approved),
            "rejected" => Some(ClaimStatus::Rejected),
            "resolved" => Some(ClaimStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location_found: String,
    pub date_found: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_filename: Option<String>,
    pub status: ItemStatus,
    pub reporter_name: String,
    pub reporter_email: String,
    pub created_at: i64,
}

impl Item {
    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let status: String = row.try_get("status").map_err(AppError::from)?;
        let status = ItemStatus::parse(&status).ok_or_else(|| {
            AppError::new("DB/BAD_STATUS", "Stored item status is not recognized")
                .with_context("status", status.clone())
        })?;
        Ok(Item {
            id: row.try_get("id").map_err(AppError::from)?,
            title: row.try_get("title").map_err(AppError::from)?,
            description: row.try_get("description").map_err(AppError::from)?,
            category: row.try_get("category").map_err(AppError::from)?,
            location_found: row.try_get("location_found").map_err(AppError::from)?,
            date_found: row.try_get("date_found").map_err(AppError::from)?,
            photo_filename: row.try_get("photo_filename").map_err(AppError::from)?,
            status,
            reporter_name: row.try_get("reporter_name").map_err(AppError::from)?,
            reporter_email: row.try_get("reporter_email").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Claim {
    pub id: i64,
    pub item_id: i64,
    pub claimant_name: String,
    pub claimant_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_filename: Option<String>,
    pub status: ClaimStatus,
    pub created_at: i64,
}

impl Claim {
    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let status: String = row.try_get("status").map_err(AppError::from)?;
        let status = ClaimStatus::parse(&status).ok_or_else(|| {
            AppError::new("DB/BAD_STATUS", "Stored claim status is not recognized")
                .with_context("status", status.clone())
        })?;
        Ok(Claim {
            id: row.try_get("id").map_err(AppError::from)?,
            item_id: row.try_get("item_id").map_err(AppError::from)?,
            claimant_name: row.try_get("claimant_name").map_err(AppError::from)?,
            claimant_email: row.try_get("claimant_email").map_err(AppError::from)?,
            student_id: row.try_get("student_id").map_err(AppError::from)?,
            message: row.try_get("message").map_err(AppError::from)?,
            proof_filename: row.try_get("proof_filename").map_err(AppError::from)?,
            status,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
        })
    }
}

/// A claim joined with its owning item, as surfaced on the admin triage list.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimWithItem {
    #[serde(flatten)]
    pub claim: Claim,
    pub item_title: String,
    pub item_status: ItemStatus,
}

/// Who is asking. Resolved per request by the authorization gate and passed
/// explicitly into the engines instead of living in ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    Public,
    Admin,
}

impl Requester {
    pub fn is_admin(&self) -> bool {
        matches!(self, Requester::Admin)
    }
}
