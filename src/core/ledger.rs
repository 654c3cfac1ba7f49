//! Stock ledger - in, out and restore operations on material and product stock.
//!
//! Each operation runs in one database transaction that also appends its operation
//! record, so a rejected operation leaves neither a stock change nor a record behind.
//! Decrements are conditional updates (`... WHERE stock_count >= q`) and the affected
//! row count is checked, so stock never goes negative even with concurrent writers.

use crate::{
    config::{LedgerSettings, Limits},
    core::{
        catalog,
        pricing::{self, BomLine},
        product,
        record::{self, NewRecord, OperationType},
        views,
    },
    entities::{Material, Product, material, operation_record, product as product_entity},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Receive material stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialInRequest {
    /// Material to receive
    pub material_id: i64,
    /// Units received
    pub quantity: i64,
    /// Optional supplier note
    #[serde(default)]
    pub supplier: Option<String>,
}

/// Ship material stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialOutRequest {
    /// Material to ship
    pub material_id: i64,
    /// Units shipped
    pub quantity: i64,
    /// Unit price charged, defaults to the material's `out_price`
    #[serde(default)]
    pub price: Option<f64>,
    /// Optional customer note
    #[serde(default)]
    pub customer: Option<String>,
}

/// Build product units from materials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInRequest {
    /// Product to build
    pub product_id: i64,
    /// Units built
    pub quantity: i64,
    /// Optional customer note
    #[serde(default)]
    pub customer: Option<String>,
}

/// Ship product stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductOutRequest {
    /// Product to ship
    pub product_id: i64,
    /// Units shipped
    pub quantity: i64,
    /// Unit price charged, defaults to the derived sale price
    #[serde(default)]
    pub price: Option<f64>,
    /// Optional customer note
    #[serde(default)]
    pub customer: Option<String>,
}

/// Return previously shipped product units to stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductRestoreRequest {
    /// Product to restore
    pub product_id: i64,
    /// Units returned
    pub quantity: i64,
    /// Why the units came back
    pub reason: String,
}

/// Outcome of a successful ledger operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// The record written for this operation
    pub record: operation_record::Model,
    /// Stock of the material or product after the operation
    pub stock_count: i64,
    /// Informational revenue of an out-bound operation
    pub revenue: Option<f64>,
}

fn with_note(mut detail: String, label: &str, note: Option<&str>) -> String {
    if let Some(note) = note {
        detail.push_str(&format!(", {label}: {note}"));
    }
    detail
}

fn revenue(price: f64, quantity: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let quantity = quantity as f64;
    price * quantity
}

async fn find_material<C: ConnectionTrait>(db: &C, material_id: i64) -> Result<material::Model> {
    Material::find_by_id(material_id)
        .one(db)
        .await?
        .ok_or(Error::MaterialNotFound { id: material_id })
}

async fn find_product<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
) -> Result<product_entity::Model> {
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })
}

/// Adds `delta` to a material's stock. Returns the number of rows touched.
async fn add_material_stock<C: ConnectionTrait>(db: &C, material_id: i64, delta: i64) -> Result<u64> {
    let result = Material::update_many()
        .col_expr(
            material::Column::StockCount,
            Expr::col(material::Column::StockCount).add(delta),
        )
        .col_expr(material::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(material::Column::Id.eq(material_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Removes `quantity` from a material's stock only if enough is on hand.
async fn take_material_stock<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    quantity: i64,
) -> Result<bool> {
    let result = Material::update_many()
        .col_expr(
            material::Column::StockCount,
            Expr::col(material::Column::StockCount).sub(quantity),
        )
        .col_expr(material::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(material::Column::Id.eq(material_id))
        .filter(material::Column::StockCount.gte(quantity))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn add_product_stock<C: ConnectionTrait>(db: &C, product_id: i64, delta: i64) -> Result<()> {
    Product::update_many()
        .col_expr(
            product_entity::Column::StockCount,
            Expr::col(product_entity::Column::StockCount).add(delta),
        )
        .col_expr(product_entity::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_entity::Column::Id.eq(product_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn take_product_stock<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
    quantity: i64,
) -> Result<bool> {
    let result = Product::update_many()
        .col_expr(
            product_entity::Column::StockCount,
            Expr::col(product_entity::Column::StockCount).sub(quantity),
        )
        .col_expr(product_entity::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_entity::Column::Id.eq(product_id))
        .filter(product_entity::Column::StockCount.gte(quantity))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Effective bill of materials of a product, in submission order.
async fn bom_of<C: ConnectionTrait>(db: &C, product_id: i64) -> Result<Vec<BomLine>> {
    Ok(product::lines_of(db, product_id)
        .await?
        .into_iter()
        .filter(|line| line.required_quantity > 0)
        .map(|line| BomLine::new(line.material_id, line.required_quantity))
        .collect())
}

/// Receives material stock. Always succeeds for an existing material and a valid quantity.
#[instrument(skip(db, limits))]
pub async fn material_in(
    db: &DatabaseConnection,
    request: MaterialInRequest,
    username: &str,
    limits: &Limits,
) -> Result<LedgerReceipt> {
    let quantity = catalog::validate_quantity(request.quantity, limits)?;
    let supplier =
        catalog::validate_note(request.supplier.as_deref(), "Supplier", limits.max_party_length)?;

    let txn = db.begin().await?;
    let material = find_material(&txn, request.material_id).await?;
    add_material_stock(&txn, material.id, quantity).await?;
    let stock_count = find_material(&txn, material.id).await?.stock_count;

    let detail = with_note(format!("quantity: +{quantity}"), "supplier", supplier.as_deref());
    let record = record::append_record(
        &txn,
        username,
        NewRecord::new(OperationType::MaterialIn, Some(material.id), &material.name, detail)
            .with_quantity(quantity),
    )
    .await?;
    txn.commit().await?;

    info!("Material '{}' in +{quantity}, stock now {stock_count}", material.name);
    Ok(LedgerReceipt {
        record,
        stock_count,
        revenue: None,
    })
}

/// Ships material stock.
///
/// # Errors
/// `InsufficientStock` when `quantity` exceeds the stock on hand; stock is left unchanged.
#[instrument(skip(db, limits))]
pub async fn material_out(
    db: &DatabaseConnection,
    request: MaterialOutRequest,
    username: &str,
    limits: &Limits,
) -> Result<LedgerReceipt> {
    let quantity = catalog::validate_quantity(request.quantity, limits)?;
    let customer =
        catalog::validate_note(request.customer.as_deref(), "Customer", limits.max_party_length)?;

    let txn = db.begin().await?;
    let material = find_material(&txn, request.material_id).await?;
    let price = catalog::validate_price(request.price.unwrap_or(material.out_price), "price")?;

    if !take_material_stock(&txn, material.id, quantity).await? {
        warn!(
            "Material '{}' out rejected: requested {quantity}, available {}",
            material.name, material.stock_count
        );
        return Err(Error::InsufficientStock {
            name: material.name,
            available: material.stock_count,
            requested: quantity,
        });
    }
    let stock_count = find_material(&txn, material.id).await?.stock_count;

    let amount = revenue(price, quantity);
    let detail = with_note(
        format!("quantity: -{quantity}, price: {price}"),
        "customer",
        customer.as_deref(),
    );
    let record = record::append_record(
        &txn,
        username,
        NewRecord::new(OperationType::MaterialOut, Some(material.id), &material.name, detail)
            .with_quantity(-quantity)
            .with_amount(amount),
    )
    .await?;
    txn.commit().await?;

    info!("Material '{}' out -{quantity}, stock now {stock_count}", material.name);
    Ok(LedgerReceipt {
        record,
        stock_count,
        revenue: Some(amount),
    })
}

/// Builds product units, consuming `required × quantity` of every material.
///
/// All material decrements and the product increment commit together or not at all.
///
/// # Errors
/// `InsufficientMaterials` when `quantity` exceeds what current material stock can build.
#[instrument(skip(db, limits))]
pub async fn product_in(
    db: &DatabaseConnection,
    request: ProductInRequest,
    username: &str,
    limits: &Limits,
) -> Result<LedgerReceipt> {
    let quantity = catalog::validate_quantity(request.quantity, limits)?;
    let customer =
        catalog::validate_note(request.customer.as_deref(), "Customer", limits.max_party_length)?;

    let txn = db.begin().await?;
    let product = find_product(&txn, request.product_id).await?;
    let lines = bom_of(&txn, product.id).await?;
    let normalized = pricing::normalize_lines(&lines);

    if !normalized.is_empty() {
        let materials = product::materials_by_id(&txn, normalized.keys().copied()).await?;
        let possible =
            views::possible_quantity(&lines, &views::stock_table(materials.values())).unwrap_or(0);
        let shortage = || Error::InsufficientMaterials {
            product: product.name.clone(),
            possible,
            requested: quantity,
        };
        if quantity > possible {
            warn!(
                "Product '{}' in rejected: requested {quantity}, possible {possible}",
                product.name
            );
            return Err(shortage());
        }

        for (&material_id, &required) in &normalized {
            let consumed = required
                .checked_mul(quantity)
                .ok_or_else(|| Error::validation("Quantity is too large"))?;
            // Dropping the transaction rolls back any decrement already applied
            if !take_material_stock(&txn, material_id, consumed).await? {
                warn!(
                    "Product '{}' in rolled back: material {material_id} short of {consumed}",
                    product.name
                );
                return Err(shortage());
            }
        }
    }

    add_product_stock(&txn, product.id, quantity).await?;
    let stock_count = find_product(&txn, product.id).await?.stock_count;

    let consumption = normalized
        .iter()
        .map(|(material_id, required)| format!("#{material_id} x{}", required * quantity))
        .collect::<Vec<_>>()
        .join(" ");
    let mut detail = format!("quantity: +{quantity}");
    if !consumption.is_empty() {
        detail.push_str(&format!(", consumed: {consumption}"));
    }
    let detail = with_note(detail, "customer", customer.as_deref());
    let record = record::append_record(
        &txn,
        username,
        NewRecord::new(OperationType::ProductIn, Some(product.id), &product.name, detail)
            .with_quantity(quantity),
    )
    .await?;
    txn.commit().await?;

    info!("Product '{}' in +{quantity}, stock now {stock_count}", product.name);
    Ok(LedgerReceipt {
        record,
        stock_count,
        revenue: None,
    })
}

/// Ships product stock.
///
/// # Errors
/// `InsufficientStock` when `quantity` exceeds the product's stock; stock is left unchanged.
#[instrument(skip(db, limits))]
pub async fn product_out(
    db: &DatabaseConnection,
    request: ProductOutRequest,
    username: &str,
    limits: &Limits,
) -> Result<LedgerReceipt> {
    let quantity = catalog::validate_quantity(request.quantity, limits)?;
    let customer =
        catalog::validate_note(request.customer.as_deref(), "Customer", limits.max_party_length)?;

    let txn = db.begin().await?;
    let product = find_product(&txn, request.product_id).await?;
    let price = match request.price {
        Some(price) => catalog::validate_price(price, "price")?,
        None => product::load_view(&txn, product.clone()).await?.sale,
    };

    if !take_product_stock(&txn, product.id, quantity).await? {
        warn!(
            "Product '{}' out rejected: requested {quantity}, available {}",
            product.name, product.stock_count
        );
        return Err(Error::InsufficientStock {
            name: product.name,
            available: product.stock_count,
            requested: quantity,
        });
    }
    let stock_count = find_product(&txn, product.id).await?.stock_count;

    let amount = revenue(price, quantity);
    let detail = with_note(
        format!("quantity: -{quantity}, price: {price}"),
        "customer",
        customer.as_deref(),
    );
    let record = record::append_record(
        &txn,
        username,
        NewRecord::new(OperationType::ProductOut, Some(product.id), &product.name, detail)
            .with_quantity(-quantity)
            .with_amount(amount),
    )
    .await?;
    txn.commit().await?;

    info!("Product '{}' out -{quantity}, stock now {stock_count}", product.name);
    Ok(LedgerReceipt {
        record,
        stock_count,
        revenue: Some(amount),
    })
}

/// Returns shipped product units to stock.
///
/// With `restore_returns_materials` set, every required material also gains
/// `required × quantity` in the same transaction.
#[instrument(skip(db, limits, settings))]
pub async fn product_restore(
    db: &DatabaseConnection,
    request: ProductRestoreRequest,
    username: &str,
    limits: &Limits,
    settings: LedgerSettings,
) -> Result<LedgerReceipt> {
    let quantity = catalog::validate_quantity(request.quantity, limits)?;
    let reason = catalog::validate_note(Some(&request.reason), "Reason", limits.max_detail_length)?
        .ok_or_else(|| Error::validation("A restore reason is required"))?;

    let txn = db.begin().await?;
    let product = find_product(&txn, request.product_id).await?;
    add_product_stock(&txn, product.id, quantity).await?;

    let mut returned = Vec::new();
    if settings.restore_returns_materials {
        let lines = bom_of(&txn, product.id).await?;
        for (material_id, required) in pricing::normalize_lines(&lines) {
            let amount = required
                .checked_mul(quantity)
                .ok_or_else(|| Error::validation("Quantity is too large"))?;
            // Materials deleted since the build are skipped
            if add_material_stock(&txn, material_id, amount).await? > 0 {
                returned.push(format!("#{material_id} x{amount}"));
            }
        }
    }
    let stock_count = find_product(&txn, product.id).await?.stock_count;

    let mut detail = format!("quantity: +{quantity}, reason: {reason}");
    if !returned.is_empty() {
        detail.push_str(&format!(", returned: {}", returned.join(" ")));
    }
    let record = record::append_record(
        &txn,
        username,
        NewRecord::new(OperationType::ProductRestore, Some(product.id), &product.name, detail)
            .with_quantity(quantity),
    )
    .await?;
    txn.commit().await?;

    info!("Product '{}' restored +{quantity}, stock now {stock_count}", product.name);
    Ok(LedgerReceipt {
        record,
        stock_count,
        revenue: None,
    })
}
