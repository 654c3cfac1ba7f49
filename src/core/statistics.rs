//! Read-only aggregates for the statistics endpoints and the system dashboard.
//!
//! Everything is computed from current catalog rows and the operation records inside a
//! trailing window of `days` whole UTC days (today included).

use crate::{
    config::Limits,
    core::{
        catalog::PageRequest,
        material, product,
        record::OperationType,
        views::{self, MaterialView, ProductView},
    },
    entities::{
        Material, OperationRecord, Product, User, UserSession, operation_record,
    },
    errors::{Error, Result},
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Longest window the statistics accept.
pub const MAX_WINDOW_DAYS: u32 = 365;
/// Largest `limit` for top products.
pub const MAX_TOP_PRODUCTS: usize = 50;

/// Headline numbers for the statistics page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Window length in days
    pub days: u32,
    /// Number of materials
    pub material_count: u64,
    /// Number of products
    pub product_count: u64,
    /// Units of all materials on hand
    pub material_stock: i64,
    /// Units of all products on hand
    pub product_stock: i64,
    /// `Σ stock × out_price` over materials
    pub material_value: f64,
    /// `Σ stock × derived sale` over products
    pub product_value: f64,
    /// Product-out operations in the window
    pub orders: u64,
    /// Product units shipped in the window
    pub units_sold: i64,
    /// Revenue of all out-bound operations in the window
    pub revenue: f64,
}

/// One row of the best-seller ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopProduct {
    /// Product id, `None` for records without a subject
    pub product_id: Option<i64>,
    /// Product name as recorded
    pub name: String,
    /// Units shipped in the window
    pub quantity: i64,
    /// Revenue in the window
    pub revenue: f64,
}

/// Net product movement on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// UTC day
    pub date: NaiveDate,
    /// Units built
    pub produced: i64,
    /// Units shipped
    pub sold: i64,
    /// Units returned
    pub restored: i64,
    /// `produced - sold + restored`
    pub net: i64,
}

/// Row counts shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    /// Materials
    pub materials: u64,
    /// Products
    pub products: u64,
    /// User accounts
    pub users: u64,
    /// Open sessions (including not yet purged expired ones)
    pub sessions: u64,
    /// Operation records
    pub records: u64,
}

/// Validates a window length.
pub fn validate_days(days: u32) -> Result<u32> {
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(Error::validation(format!(
            "days must be between 1 and {MAX_WINDOW_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

fn window_start(days: u32) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(i64::from(days) - 1)
}

async fn records_since<C: ConnectionTrait>(
    db: &C,
    since: NaiveDate,
    types: &[OperationType],
) -> Result<Vec<operation_record::Model>> {
    let start = Utc.from_utc_datetime(&since.and_time(chrono::NaiveTime::MIN));
    OperationRecord::find()
        .filter(operation_record::Column::CreatedAt.gte(start))
        .filter(operation_record::Column::OperationType.is_in(types.iter().map(|t| t.as_str())))
        .order_by_asc(operation_record::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Catalog totals plus sales in the window.
pub async fn summary<C: ConnectionTrait>(db: &C, days: u32, limits: &Limits) -> Result<Summary> {
    let days = validate_days(days)?;
    let materials: Vec<MaterialView> =
        material::list_materials(db, PageRequest::default(), limits).await?.items;
    let products: Vec<ProductView> =
        product::list_products(db, PageRequest::default(), limits).await?.items;

    let records = records_since(
        db,
        window_start(days),
        &[OperationType::ProductOut, OperationType::MaterialOut],
    )
    .await?;
    let product_outs = records
        .iter()
        .filter(|r| r.operation_type == OperationType::ProductOut.as_str());

    Ok(Summary {
        days,
        material_count: materials.len() as u64,
        product_count: products.len() as u64,
        material_stock: materials.iter().map(|m| m.material.stock_count).sum(),
        product_stock: products.iter().map(|p| p.product.stock_count).sum(),
        material_value: views::total_material_value(&materials),
        product_value: views::total_product_value(&products),
        orders: product_outs.clone().count() as u64,
        units_sold: product_outs.map(|r| -r.quantity).sum(),
        revenue: records.iter().filter_map(|r| r.amount).sum(),
    })
}

/// Best-selling products in the window by revenue, then by units.
pub async fn top_products<C: ConnectionTrait>(
    db: &C,
    limit: usize,
    days: u32,
) -> Result<Vec<TopProduct>> {
    let days = validate_days(days)?;
    let limit = limit.clamp(1, MAX_TOP_PRODUCTS);
    let records = records_since(db, window_start(days), &[OperationType::ProductOut]).await?;

    // Grouped by id when known, by name otherwise; the value keeps the latest recorded name
    let mut grouped: HashMap<(Option<i64>, String), (String, i64, f64)> = HashMap::new();
    for record in records {
        let key = match record.subject_id {
            Some(id) => (Some(id), String::new()),
            None => (None, record.name.clone()),
        };
        let entry = grouped.entry(key).or_insert((String::new(), 0, 0.0));
        entry.0 = record.name;
        entry.1 += -record.quantity;
        entry.2 += record.amount.unwrap_or(0.0);
    }

    // Current names win over recorded ones for products that still exist
    let names: HashMap<i64, String> = Product::find()
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let mut ranking: Vec<TopProduct> = grouped
        .into_iter()
        .map(|((product_id, _), (recorded_name, quantity, revenue))| TopProduct {
            name: product_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or(recorded_name),
            product_id,
            quantity,
            revenue,
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then(b.quantity.cmp(&a.quantity))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranking.truncate(limit);
    Ok(ranking)
}

/// Per-day product movement over the window, oldest day first, one point per day.
pub async fn product_trend<C: ConnectionTrait>(
    db: &C,
    product_id: Option<i64>,
    days: u32,
) -> Result<Vec<TrendPoint>> {
    let days = validate_days(days)?;
    let start = window_start(days);
    let records = records_since(
        db,
        start,
        &[
            OperationType::ProductIn,
            OperationType::ProductOut,
            OperationType::ProductRestore,
        ],
    )
    .await?;

    let mut points: BTreeMap<NaiveDate, TrendPoint> = (0..i64::from(days))
        .map(|offset| {
            let date = start + Duration::days(offset);
            (
                date,
                TrendPoint {
                    date,
                    produced: 0,
                    sold: 0,
                    restored: 0,
                    net: 0,
                },
            )
        })
        .collect();

    for record in records {
        if product_id.is_some() && record.subject_id != product_id {
            continue;
        }
        let Some(point) = points.get_mut(&record.created_at.date_naive()) else {
            continue;
        };
        match record.operation_type.parse::<OperationType>() {
            Ok(OperationType::ProductIn) => point.produced += record.quantity,
            Ok(OperationType::ProductOut) => point.sold += -record.quantity,
            Ok(OperationType::ProductRestore) => point.restored += record.quantity,
            _ => continue,
        }
        point.net = point.produced - point.sold + point.restored;
    }
    Ok(points.into_values().collect())
}

/// Row counts for the dashboard.
pub async fn entity_counts<C: ConnectionTrait>(db: &C) -> Result<EntityCounts> {
    Ok(EntityCounts {
        materials: Material::find().count(db).await?,
        products: Product::find().count(db).await?,
        users: User::find().count(db).await?,
        sessions: UserSession::find().count(db).await?,
        records: OperationRecord::find().count(db).await?,
    })
}
