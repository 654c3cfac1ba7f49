//! Records, statistics and dashboard endpoints.

use crate::{
    api::{
        AppState,
        auth::CurrentUser,
        response::{ApiResponse, ApiResult, Params},
    },
    core::{
        record::{self, RecordFilter, RecordPage, SortOrder},
        statistics::{self, EntityCounts, Summary, TopProduct, TrendPoint},
    },
    entities::operation_record,
    errors::Result,
};
use axum::{Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_WINDOW_DAYS: u32 = 30;
const DEFAULT_TOP_LIMIT: usize = 10;

/// Query string of `/records` and `/records/export`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordQuery {
    /// `YYYY-MM-DD`, inclusive
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, inclusive of the whole day
    pub end_date: Option<String>,
    /// Comma-separated operation types
    pub operation_type: Option<String>,
    /// Comma-separated usernames
    pub username: Option<String>,
    /// Substring of detail or name
    pub search: Option<String>,
    /// `asc` or `desc`
    pub sort_order: Option<SortOrder>,
    /// One-based page number
    pub page: Option<u64>,
    /// Records per page
    pub page_size: Option<u64>,
}

impl RecordQuery {
    /// Parses the query into a filter.
    pub fn filter(&self) -> Result<RecordFilter> {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Ok(RecordFilter {
            start_date: non_blank(&self.start_date)
                .map(|raw| record::parse_day(&raw))
                .transpose()?,
            end_date: non_blank(&self.end_date)
                .map(|raw| record::parse_day(&raw))
                .transpose()?,
            operation_types: match non_blank(&self.operation_type) {
                Some(raw) => record::parse_operation_types(&raw)?,
                None => Vec::new(),
            },
            usernames: non_blank(&self.username)
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            search: non_blank(&self.search),
            sort_order: self.sort_order.unwrap_or_default(),
        })
    }
}

/// Query string of the statistics endpoints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WindowQuery {
    /// Window length in days
    pub days: Option<u32>,
    /// Ranking length (top products)
    pub limit: Option<usize>,
    /// Restrict the trend to one product
    pub product_id: Option<i64>,
}

/// Database health as seen by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStatus {
    /// Whether a ping succeeded
    pub reachable: bool,
    /// Row counts, absent when the database is unreachable
    pub counts: Option<EntityCounts>,
}

/// Payload of `/system/dashboard`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Seconds since the server started
    pub uptime_secs: u64,
    /// Database health
    pub database: DatabaseStatus,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/records", get(records))
        .route("/records/export", get(export))
        .route("/statistics/summary", get(summary))
        .route("/statistics/top-products", get(top_products))
        .route("/statistics/product-trend", get(product_trend))
        .route("/system/dashboard", get(dashboard))
}

async fn records(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Params(query): Params<RecordQuery>,
) -> ApiResult<RecordPage> {
    let filter = query.filter()?;
    let page = record::query_records(
        &state.db,
        &filter,
        query.page.unwrap_or(1),
        query.page_size,
        &state.config.limits,
    )
    .await?;
    Ok(ApiResponse::ok(page))
}

async fn export(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Params(query): Params<RecordQuery>,
) -> ApiResult<Vec<operation_record::Model>> {
    let filter = query.filter()?;
    let records = record::export_records(&state.db, &filter).await?;
    Ok(ApiResponse::with_message(
        format!("{} records", records.len()),
        records,
    ))
}

async fn summary(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Params(query): Params<WindowQuery>,
) -> ApiResult<Summary> {
    let days = query.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    let summary = statistics::summary(&state.db, days, &state.config.limits).await?;
    Ok(ApiResponse::ok(summary))
}

async fn top_products(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Params(query): Params<WindowQuery>,
) -> ApiResult<Vec<TopProduct>> {
    let ranking = statistics::top_products(
        &state.db,
        query.limit.unwrap_or(DEFAULT_TOP_LIMIT),
        query.days.unwrap_or(DEFAULT_WINDOW_DAYS),
    )
    .await?;
    Ok(ApiResponse::ok(ranking))
}

async fn product_trend(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Params(query): Params<WindowQuery>,
) -> ApiResult<Vec<TrendPoint>> {
    let trend = statistics::product_trend(
        &state.db,
        query.product_id,
        query.days.unwrap_or(DEFAULT_WINDOW_DAYS),
    )
    .await?;
    Ok(ApiResponse::ok(trend))
}

async fn dashboard(State(state): State<AppState>, CurrentUser(_): CurrentUser) -> ApiResult<Dashboard> {
    let reachable = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Database ping failed: {e}");
            false
        }
    };
    let counts = if reachable {
        Some(statistics::entity_counts(&state.db).await?)
    } else {
        None
    };
    Ok(ApiResponse::ok(Dashboard {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        database: DatabaseStatus { reachable, counts },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::OperationType;
    use crate::errors::Error;

    #[test]
    fn test_record_query_to_filter() -> Result<()> {
        let query = RecordQuery {
            start_date: Some("2025-01-01".to_string()),
            end_date: Some(" ".to_string()),
            operation_type: Some("material_in,product_out".to_string()),
            username: Some("alice, bob".to_string()),
            search: Some("  ".to_string()),
            sort_order: Some(SortOrder::Asc),
            ..RecordQuery::default()
        };
        let filter = query.filter()?;
        assert!(filter.start_date.is_some());
        assert!(filter.end_date.is_none());
        assert_eq!(
            filter.operation_types,
            vec![OperationType::MaterialIn, OperationType::ProductOut]
        );
        assert_eq!(filter.usernames, vec!["alice".to_string(), "bob".to_string()]);
        assert!(filter.search.is_none());
        assert_eq!(filter.sort_order, SortOrder::Asc);
        Ok(())
    }

    #[test]
    fn test_record_query_rejects_bad_date() {
        let query = RecordQuery {
            end_date: Some("yesterday".to_string()),
            ..RecordQuery::default()
        };
        assert!(matches!(query.filter(), Err(Error::Validation { .. })));
    }
}
