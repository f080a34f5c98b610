use serde::Deserialize;
use sqlx::SqlitePool;

use crate::model::{Item, ItemStatus};
use crate::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 50;
pub const ADMIN_LIST_CAP: i64 = 200;

/// Query string accepted by the public listing endpoint. Every filter is
/// optional and they compose with AND semantics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, serde::Serialize)]
pub struct ItemPage {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub items: Vec<Item>,
}

/// One compiled filter: a SQL predicate with `?` placeholders and the values
/// bound to them, in order. Values never reach the SQL text itself.
struct Predicate {
    clause: &'static str,
    binds: Vec<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn compile_filters(query: &ItemQuery, default_status: Option<&str>) -> Vec<Predicate> {
    let mut predicates = Vec::new();

    if let Some(q) = non_empty(&query.q) {
        predicates.push(Predicate {
            clause: "(title LIKE '%' || ? || '%' OR description LIKE '%' || ? || '%')",
            binds: vec![q.to_string(), q.to_string()],
        });
    }
    if let Some(category) = non_empty(&query.category) {
        predicates.push(Predicate {
            clause: "category = ?",
            binds: vec![category.to_string()],
        });
    }
    if let Some(location) = non_empty(&query.location) {
        predicates.push(Predicate {
            clause: "location_found LIKE '%' || ? || '%'",
            binds: vec![location.to_string()],
        });
    }
    if let Some(status) = non_empty(&query.status).or(default_status) {
        predicates.push(Predicate {
            clause: "status = ?",
            binds: vec![status.to_string()],
        });
    }
    if let Some(from) = non_empty(&query.date_from) {
        predicates.push(Predicate {
            clause: "date_found >= ?",
            binds: vec![from.to_string()],
        });
    }
    if let Some(to) = non_empty(&query.date_to) {
        predicates.push(Predicate {
            clause: "date_found <= ?",
            binds: vec![to.to_string()],
        });
    }

    predicates
}

fn where_sql(predicates: &[Predicate]) -> String {
    if predicates.is_empty() {
        String::new()
    } else {
        let clauses: Vec<&str> = predicates.iter().map(|p| p.clause).collect();
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn order_sql(sort: Option<&str>) -> &'static str {
    // id is a monotonic tiebreaker so fixed-filter pages never overlap
    match sort {
        Some("oldest") => " ORDER BY created_at ASC, id ASC",
        _ => " ORDER BY created_at DESC, id DESC",
    }
}

/// Public listing: restricted to approved items unless the caller names a
/// status explicitly. Returns the pre-pagination total plus one page.
pub async fn list_items(pool: &SqlitePool, query: &ItemQuery) -> AppResult<ItemPage> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let predicates = compile_filters(query, Some(ItemStatus::Approved.as_str()));
    let filter = where_sql(&predicates);

    let count_sql = format!("SELECT COUNT(*) FROM items{filter}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for p in &predicates {
        for bind in &p.binds {
            count_query = count_query.bind(bind);
        }
    }
    let total = count_query
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::from(e).with_context("operation", "list_items_count"))?;

    let rows_sql = format!(
        "SELECT * FROM items{filter}{} LIMIT ? OFFSET ?",
        order_sql(query.sort.as_deref())
    );
    let mut rows_query = sqlx::query(&rows_sql);
    for p in &predicates {
        for bind in &p.binds {
            rows_query = rows_query.bind(bind);
        }
    }
    let rows = rows_query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::from(e).with_context("operation", "list_items"))?;

    let items = rows
        .iter()
        .map(Item::from_row)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ItemPage {
        page,
        limit,
        total,
        items,
    })
}

/// Admin listing: status and free-text filters only, newest first, capped.
/// No default status restriction and no total count.
pub async fn admin_list_items(
    pool: &SqlitePool,
    status: Option<&str>,
    q: Option<&str>,
) -> AppResult<Vec<Item>> {
    let query = ItemQuery {
        q: q.map(str::to_string),
        status: status.map(str::to_string),
        ..ItemQuery::default()
    };
    let predicates = compile_filters(&query, None);
    let filter = where_sql(&predicates);

    let sql = format!("SELECT * FROM items{filter} ORDER BY created_at DESC, id DESC LIMIT ?");
    let mut rows_query = sqlx::query(&sql);
    for p in &predicates {
        for bind in &p.binds {
            rows_query = rows_query.bind(bind);
        }
    }
    let rows = rows_query
        .bind(ADMIN_LIST_CAP)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::from(e).with_context("operation", "admin_list_items"))?;

    rows.iter().map(Item::from_row).collect()
}
