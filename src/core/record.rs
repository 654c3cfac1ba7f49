//! Operation record business logic - append-only audit trail.
//!
//! Every successful mutation writes exactly one record through [`append_record`], using
//! the same connection (usually a `DatabaseTransaction`) as the change itself. A rolled
//! back operation therefore leaves no record behind. There are deliberately no update or
//! delete functions in this module.

use crate::{
    config::Limits,
    core::catalog,
    entities::{OperationRecord, operation_record},
    errors::{Error, Result},
};
use chrono::{NaiveDate, TimeZone, Utc};
use sea_orm::{
    Condition, ConnectionTrait, PaginatorTrait, QueryOrder, QuerySelect, Set, prelude::*,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of operations that produce a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Material created
    MaterialCreate,
    /// Material name, prices or image changed
    MaterialUpdate,
    /// Material deleted
    MaterialDelete,
    /// Material stock received
    MaterialIn,
    /// Material stock shipped
    MaterialOut,
    /// Product created
    ProductCreate,
    /// Product name, bill of materials or prices changed
    ProductUpdate,
    /// Product deleted
    ProductDelete,
    /// Product built from materials
    ProductIn,
    /// Product stock shipped
    ProductOut,
    /// Product stock returned
    ProductRestore,
    /// User account created
    UserCreate,
    /// User account changed
    UserUpdate,
    /// User account deleted
    UserDelete,
    /// A user's session revoked by an administrator
    SessionRevoke,
    /// Successful login
    Login,
    /// Logout
    Logout,
}

impl OperationType {
    /// Every operation type, in declaration order.
    pub const ALL: [Self; 17] = [
        Self::MaterialCreate,
        Self::MaterialUpdate,
        Self::MaterialDelete,
        Self::MaterialIn,
        Self::MaterialOut,
        Self::ProductCreate,
        Self::ProductUpdate,
        Self::ProductDelete,
        Self::ProductIn,
        Self::ProductOut,
        Self::ProductRestore,
        Self::UserCreate,
        Self::UserUpdate,
        Self::UserDelete,
        Self::SessionRevoke,
        Self::Login,
        Self::Logout,
    ];

    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MaterialCreate => "material_create",
            Self::MaterialUpdate => "material_update",
            Self::MaterialDelete => "material_delete",
            Self::MaterialIn => "material_in",
            Self::MaterialOut => "material_out",
            Self::ProductCreate => "product_create",
            Self::ProductUpdate => "product_update",
            Self::ProductDelete => "product_delete",
            Self::ProductIn => "product_in",
            Self::ProductOut => "product_out",
            Self::ProductRestore => "product_restore",
            Self::UserCreate => "user_create",
            Self::UserUpdate => "user_update",
            Self::UserDelete => "user_delete",
            Self::SessionRevoke => "session_revoke",
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::validation(format!("Unknown operation type '{s}'")))
    }
}

/// Fields of a record about to be written.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// What happened
    pub operation_type: OperationType,
    /// Id of the touched material, product or user
    pub subject_id: Option<i64>,
    /// Name of the touched entity
    pub name: String,
    /// Signed quantity, negative for out-bound movements
    pub quantity: i64,
    /// Informational revenue for out-bound movements
    pub amount: Option<f64>,
    /// Free-form description
    pub detail: String,
}

impl NewRecord {
    /// Record with no quantity or amount.
    pub fn new(
        operation_type: OperationType,
        subject_id: Option<i64>,
        name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            operation_type,
            subject_id,
            name: name.into(),
            quantity: 0,
            amount: None,
            detail: detail.into(),
        }
    }

    /// Sets the signed quantity.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the informational revenue.
    #[must_use]
    pub const fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Appends one record on the given connection or transaction.
pub async fn append_record<C: ConnectionTrait>(
    db: &C,
    username: &str,
    record: NewRecord,
) -> Result<operation_record::Model> {
    let model = operation_record::ActiveModel {
        operation_type: Set(record.operation_type.as_str().to_string()),
        subject_id: Set(record.subject_id),
        name: Set(record.name),
        quantity: Set(record.quantity),
        amount: Set(record.amount),
        detail: Set(record.detail),
        username: Set(username.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Sort direction on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

/// Filters accepted by the record listing and export.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Inclusive start day (UTC)
    pub start_date: Option<NaiveDate>,
    /// Inclusive end day (UTC), covering the whole day
    pub end_date: Option<NaiveDate>,
    /// Only these operation types
    pub operation_types: Vec<OperationType>,
    /// Only these usernames
    pub usernames: Vec<String>,
    /// Substring of detail or name
    pub search: Option<String>,
    /// Sort direction
    pub sort_order: SortOrder,
}

fn start_of_day(day: NaiveDate) -> DateTimeUtc {
    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
}

impl RecordFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(start) = self.start_date {
            condition =
                condition.add(operation_record::Column::CreatedAt.gte(start_of_day(start)));
        }
        if let Some(end) = self.end_date {
            // End day is inclusive: everything strictly before the next midnight
            let next_day = end.succ_opt().unwrap_or(end);
            condition = condition.add(operation_record::Column::CreatedAt.lt(start_of_day(next_day)));
        }
        if !self.operation_types.is_empty() {
            condition = condition.add(
                operation_record::Column::OperationType
                    .is_in(self.operation_types.iter().map(|op| op.as_str())),
            );
        }
        if !self.usernames.is_empty() {
            condition = condition
                .add(operation_record::Column::Username.is_in(self.usernames.iter().cloned()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(operation_record::Column::Detail.contains(search))
                    .add(operation_record::Column::Name.contains(search)),
            );
        }
        condition
    }

    fn select(&self) -> Select<OperationRecord> {
        let query = OperationRecord::find().filter(self.condition());
        match self.sort_order {
            SortOrder::Asc => query
                .order_by_asc(operation_record::Column::CreatedAt)
                .order_by_asc(operation_record::Column::Id),
            SortOrder::Desc => query
                .order_by_desc(operation_record::Column::CreatedAt)
                .order_by_desc(operation_record::Column::Id),
        }
    }
}

/// One page of records plus the total matching count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPage {
    /// Records on this page
    pub records: Vec<operation_record::Model>,
    /// Records matching the filter across all pages
    pub total: u64,
    /// One-based page number
    pub page: u64,
    /// Page size used
    pub page_size: u64,
}

/// Lists records matching `filter`, one page at a time.
///
/// `page` is one-based; `page_size` falls back to the default and is capped at the
/// record page limit.
pub async fn query_records<C: ConnectionTrait>(
    db: &C,
    filter: &RecordFilter,
    page: u64,
    page_size: Option<u64>,
    limits: &Limits,
) -> Result<RecordPage> {
    let page = page.max(1);
    let page_size = page_size
        .unwrap_or(limits.default_page_size)
        .clamp(1, limits.max_records_page_size);

    let offset = catalog::page_offset(page, page_size)?;

    let total = filter.select().count(db).await?;
    let records = filter
        .select()
        .offset(offset)
        .limit(page_size)
        .all(db)
        .await?;

    Ok(RecordPage {
        records,
        total,
        page,
        page_size,
    })
}

/// Returns every record matching `filter`, for export.
pub async fn export_records<C: ConnectionTrait>(
    db: &C,
    filter: &RecordFilter,
) -> Result<Vec<operation_record::Model>> {
    filter.select().all(db).await.map_err(Into::into)
}

/// Parses a comma-separated list of operation types, ignoring blanks.
pub fn parse_operation_types(raw: &str) -> Result<Vec<OperationType>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(OperationType::from_str)
        .collect()
}

/// Parses a `YYYY-MM-DD` day.
pub fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| Error::validation(format!("Invalid date '{raw}': {e}")))
}
