//! Material business logic - catalog operations on purchasable, stockable items.
//!
//! Stock movements live in [`crate::core::ledger`]; this module covers creation, listing,
//! edits and deletion. Every mutation runs in its own database transaction together with
//! the operation record that describes it.

use crate::{
    config::Limits,
    core::{
        catalog::{self, BatchOutcome, Page, PageRequest},
        pricing::{self, BomLine, MaterialPrice, PriceQuote},
        product,
        record::{self, NewRecord, OperationType},
        views::{self, MaterialView},
    },
    entities::{Material, ProductMaterial, material, product_material},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    ConnectionTrait, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Fields of a material to create.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMaterial {
    /// Unique display name
    pub name: String,
    /// Purchase cost per unit
    pub in_price: f64,
    /// Sale price per unit, defaults to `in_price`
    #[serde(default)]
    pub out_price: Option<f64>,
    /// Opaque image reference
    #[serde(default)]
    pub image_path: Option<String>,
}

/// Partial update of a material. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialChanges {
    /// New display name
    #[serde(default)]
    pub name: Option<String>,
    /// New purchase cost
    #[serde(default)]
    pub in_price: Option<f64>,
    /// New sale price
    #[serde(default)]
    pub out_price: Option<f64>,
    /// New image reference
    #[serde(default)]
    pub image_path: Option<String>,
}

async fn find_material<C: ConnectionTrait>(db: &C, material_id: i64) -> Result<material::Model> {
    Material::find_by_id(material_id)
        .one(db)
        .await?
        .ok_or(Error::MaterialNotFound { id: material_id })
}

async fn ensure_unique_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
    except_id: Option<i64>,
) -> Result<()> {
    let mut query = Material::find().filter(material::Column::Name.eq(name));
    if let Some(id) = except_id {
        query = query.filter(material::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!("Material '{name}' already exists")));
    }
    Ok(())
}

async fn used_by<C: ConnectionTrait>(db: &C, material_id: i64) -> Result<usize> {
    let lines = ProductMaterial::find()
        .filter(product_material::Column::MaterialId.eq(material_id))
        .all(db)
        .await?;
    Ok(views::used_by_products(material_id, &lines))
}

async fn view_of<C: ConnectionTrait>(db: &C, material: material::Model) -> Result<MaterialView> {
    let used_by_products = used_by(db, material.id).await?;
    Ok(MaterialView {
        material,
        used_by_products,
    })
}

/// Creates a material with zero stock.
///
/// # Errors
/// - `Validation` for an empty or overlong name or a negative price
/// - `Conflict` when the name is taken
pub async fn create_material(
    db: &DatabaseConnection,
    input: NewMaterial,
    username: &str,
    limits: &Limits,
) -> Result<MaterialView> {
    let name = catalog::validate_name(&input.name, "Material", limits)?;
    let in_price = catalog::validate_price(input.in_price, "in_price")?;
    let out_price = catalog::validate_price(input.out_price.unwrap_or(in_price), "out_price")?;

    let txn = db.begin().await?;
    ensure_unique_name(&txn, &name, None).await?;

    let now = Utc::now();
    let created = material::ActiveModel {
        name: Set(name.clone()),
        in_price: Set(in_price),
        out_price: Set(out_price),
        stock_count: Set(0),
        image_path: Set(input.image_path),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    record::append_record(
        &txn,
        username,
        NewRecord::new(
            OperationType::MaterialCreate,
            Some(created.id),
            &name,
            format!("in_price: {in_price}, out_price: {out_price}"),
        ),
    )
    .await?;
    txn.commit().await?;

    info!("Created material '{}' (id {})", created.name, created.id);
    Ok(MaterialView {
        material: created,
        used_by_products: 0,
    })
}

/// Lists materials ordered by id, whole or one page at a time.
pub async fn list_materials<C: ConnectionTrait>(
    db: &C,
    paging: PageRequest,
    limits: &Limits,
) -> Result<Page<MaterialView>> {
    let query = Material::find().order_by_asc(material::Column::Id);
    let (materials, total, page, page_size) = if paging.is_paged() {
        let (page, page_size) = paging.resolve(limits);
        let total = query.clone().count(db).await?;
        let materials = query
            .offset(catalog::page_offset(page, page_size)?)
            .limit(page_size)
            .all(db)
            .await?;
        (materials, total, page, page_size)
    } else {
        let materials = query.all(db).await?;
        let total = materials.len() as u64;
        (materials, total, 1, total.max(1))
    };

    let lines = ProductMaterial::find().all(db).await?;
    let counts = views::used_by_counts(&lines);
    let items = materials
        .into_iter()
        .map(|material| MaterialView {
            used_by_products: counts.get(&material.id).copied().unwrap_or(0),
            material,
        })
        .collect();
    Ok(Page::new(items, total, page, page_size))
}

/// Fetches one material with its usage count.
pub async fn get_material<C: ConnectionTrait>(db: &C, material_id: i64) -> Result<MaterialView> {
    let material = find_material(db, material_id).await?;
    view_of(db, material).await
}

/// Applies a partial update.
///
/// A changed price re-derives and persists the prices of every product that uses this
/// material, in the same transaction.
pub async fn update_material(
    db: &DatabaseConnection,
    material_id: i64,
    changes: MaterialChanges,
    username: &str,
    limits: &Limits,
) -> Result<MaterialView> {
    let txn = db.begin().await?;
    let current = find_material(&txn, material_id).await?;

    let mut details = Vec::new();
    let mut active: material::ActiveModel = current.clone().into();

    if let Some(raw) = changes.name.as_deref() {
        let name = catalog::validate_name(raw, "Material", limits)?;
        if name != current.name {
            ensure_unique_name(&txn, &name, Some(material_id)).await?;
            details.push(format!("name: {} -> {name}", current.name));
            active.name = Set(name);
        }
    }

    let mut price_changed = false;
    if let Some(in_price) = changes.in_price {
        let in_price = catalog::validate_price(in_price, "in_price")?;
        if in_price.to_bits() != current.in_price.to_bits() {
            details.push(format!("in_price: {} -> {in_price}", current.in_price));
            active.in_price = Set(in_price);
            price_changed = true;
        }
    }
    if let Some(out_price) = changes.out_price {
        let out_price = catalog::validate_price(out_price, "out_price")?;
        if out_price.to_bits() != current.out_price.to_bits() {
            details.push(format!("out_price: {} -> {out_price}", current.out_price));
            active.out_price = Set(out_price);
            price_changed = true;
        }
    }
    if let Some(image_path) = changes.image_path {
        if current.image_path.as_deref() != Some(image_path.as_str()) {
            details.push("image updated".to_string());
            active.image_path = Set(Some(image_path));
        }
    }

    if details.is_empty() {
        txn.commit().await?;
        return view_of(db, current).await;
    }

    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    if price_changed {
        let repriced = product::reprice_products_using(&txn, material_id).await?;
        if repriced > 0 {
            details.push(format!("repriced products: {repriced}"));
        }
    }

    record::append_record(
        &txn,
        username,
        NewRecord::new(
            OperationType::MaterialUpdate,
            Some(material_id),
            &updated.name,
            details.join(", "),
        ),
    )
    .await?;
    let view = view_of(&txn, updated).await?;
    txn.commit().await?;

    info!("Updated material '{}' (id {material_id})", view.material.name);
    Ok(view)
}

async fn delete_in_txn<C: ConnectionTrait>(
    db: &C,
    material: &material::Model,
    username: &str,
) -> Result<()> {
    let used = used_by(db, material.id).await?;
    if used > 0 {
        return Err(Error::conflict(format!(
            "Material '{}' is used by {used} product(s)",
            material.name
        )));
    }
    if material.stock_count != 0 {
        return Err(Error::conflict(format!(
            "Material '{}' still has {} unit(s) in stock",
            material.name, material.stock_count
        )));
    }

    // Zero-quantity lines never block deletion but must not dangle
    ProductMaterial::delete_many()
        .filter(product_material::Column::MaterialId.eq(material.id))
        .exec(db)
        .await?;
    Material::delete_by_id(material.id).exec(db).await?;

    record::append_record(
        db,
        username,
        NewRecord::new(
            OperationType::MaterialDelete,
            Some(material.id),
            &material.name,
            "deleted",
        ),
    )
    .await?;
    Ok(())
}

/// Deletes a material that no product needs and that has no stock left.
///
/// # Errors
/// - `MaterialNotFound` for an unknown id
/// - `Conflict` when a product still uses it or its stock is not zero
pub async fn delete_material(
    db: &DatabaseConnection,
    material_id: i64,
    username: &str,
) -> Result<()> {
    let txn = db.begin().await?;
    let material = find_material(&txn, material_id).await?;
    if let Err(e) = delete_in_txn(&txn, &material, username).await {
        warn!("Refused to delete material '{}': {e}", material.name);
        return Err(e);
    }
    txn.commit().await?;
    info!("Deleted material '{}' (id {material_id})", material.name);
    Ok(())
}

/// Deletes each material it can and reports the rest.
pub async fn batch_delete_materials(
    db: &DatabaseConnection,
    ids: &[i64],
    username: &str,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for &id in ids {
        let name = Material::find_by_id(id).one(db).await?.map(|m| m.name);
        let result = delete_material(db, id, username).await;
        outcome.push(id, name, result)?;
    }
    Ok(outcome)
}

/// Candidate prices for a material, as sent to the impact preview.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PriceChange {
    /// Candidate purchase cost
    #[serde(default)]
    pub in_price: Option<f64>,
    /// Candidate sale price
    #[serde(default)]
    pub out_price: Option<f64>,
}

/// One product whose derived prices a material price change would move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedProduct {
    /// Product id
    pub id: i64,
    /// Product name
    pub name: String,
    /// Bill of materials summary, e.g. `"Flour x2, Salt x1"`
    pub materials: String,
    /// Cost with current prices
    pub current_cost: f64,
    /// Sale price with current prices
    pub current_sale: f64,
    /// Cost with the candidate prices
    pub new_cost: f64,
    /// Sale price with the candidate prices
    pub new_sale: f64,
}

/// Result of a price change preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePreview {
    /// Whether either candidate price differs from the stored one
    pub price_changed: bool,
    /// Products that would be repriced
    pub products: Vec<AffectedProduct>,
}

fn rounded(quote: PriceQuote) -> (f64, f64) {
    (pricing::round_cents(quote.cost), pricing::round_cents(quote.sale))
}

/// Previews how a price change of one material would move dependent product prices.
///
/// Nothing is written. Values are rounded to cents.
pub async fn preview_material_price_change<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    change: PriceChange,
) -> Result<PricePreview> {
    let material = find_material(db, material_id).await?;
    let candidate = MaterialPrice {
        in_price: catalog::validate_price(change.in_price.unwrap_or(material.in_price), "in_price")?,
        out_price: catalog::validate_price(
            change.out_price.unwrap_or(material.out_price),
            "out_price",
        )?,
    };

    let price_changed = candidate.in_price.to_bits() != material.in_price.to_bits()
        || candidate.out_price.to_bits() != material.out_price.to_bits();
    if !price_changed {
        return Ok(PricePreview {
            price_changed,
            products: Vec::new(),
        });
    }

    let product_ids: Vec<i64> = ProductMaterial::find()
        .filter(product_material::Column::MaterialId.eq(material_id))
        .filter(product_material::Column::RequiredQuantity.gt(0))
        .select_only()
        .column(product_material::Column::ProductId)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    if product_ids.is_empty() {
        return Ok(PricePreview {
            price_changed,
            products: Vec::new(),
        });
    }

    let materials: HashMap<i64, material::Model> = Material::find()
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();
    let current_prices = views::price_table(materials.values());
    let mut candidate_prices = current_prices.clone();
    candidate_prices.insert(material_id, candidate);

    let mut products = Vec::with_capacity(product_ids.len());
    for product in product::find_products_by_ids(db, &product_ids).await? {
        let mut lines = product::lines_of(db, product.id).await?;
        lines.sort_by_key(|line| line.position);
        let bom: Vec<BomLine> = lines
            .iter()
            .map(|line| BomLine::new(line.material_id, line.required_quantity))
            .collect();
        let summary = lines
            .iter()
            .map(|line| {
                let name = materials
                    .get(&line.material_id)
                    .map_or("?", |m| m.name.as_str());
                format!("{name} x{}", line.required_quantity)
            })
            .collect::<Vec<_>>()
            .join(", ");

        let (current_cost, current_sale) =
            rounded(pricing::derive_prices(&bom, &current_prices, product.other_price));
        let (new_cost, new_sale) =
            rounded(pricing::derive_prices(&bom, &candidate_prices, product.other_price));
        products.push(AffectedProduct {
            id: product.id,
            name: product.name,
            materials: summary,
            current_cost,
            current_sale,
            new_cost,
            new_sale,
        });
    }

    Ok(PricePreview {
        price_changed,
        products,
    })
}
