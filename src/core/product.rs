//! Product business logic - Handles all product (formula) catalog operations.
//!
//! A product optionally carries a bill of materials. While it does, its `in_price` and
//! `out_price` are derived by [`crate::core::pricing`] and persisted on every change to
//! the lines, to `other_price` or to a referenced material's price; client-supplied
//! prices are ignored. With an empty bill of materials the stored prices are taken as
//! entered. All functions are async and return Result types for proper error handling.

use crate::{
    config::Limits,
    core::{
        catalog::{self, BatchOutcome, Page, PageRequest},
        pricing::{self, BomLine, PriceTable},
        record::{self, NewRecord, OperationType},
        views::{self, ProductView},
    },
    entities::{Material, Product, ProductMaterial, material, product, product_material},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    ConnectionTrait, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// One submitted bill-of-materials line. Incomplete lines are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    /// Referenced material
    #[serde(default)]
    pub material_id: Option<i64>,
    /// Units consumed per unit of product
    #[serde(default)]
    pub required_quantity: Option<i64>,
}

impl LineInput {
    /// A complete line.
    #[must_use]
    pub const fn new(material_id: i64, required_quantity: i64) -> Self {
        Self {
            material_id: Some(material_id),
            required_quantity: Some(required_quantity),
        }
    }
}

/// Fields of a product to create.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    /// Unique display name
    pub name: String,
    /// Bill of materials, in display order
    #[serde(default)]
    pub materials: Vec<LineInput>,
    /// Flat add-on on top of the material sale prices
    #[serde(default)]
    pub other_price: f64,
    /// Cost, used only without materials
    #[serde(default)]
    pub in_price: f64,
    /// Sale price, used only without materials
    #[serde(default)]
    pub out_price: f64,
    /// Opaque image reference
    #[serde(default)]
    pub image_path: Option<String>,
}

/// Partial update of a product. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductChanges {
    /// New display name
    #[serde(default)]
    pub name: Option<String>,
    /// Replacement bill of materials
    #[serde(default)]
    pub materials: Option<Vec<LineInput>>,
    /// New flat add-on
    #[serde(default)]
    pub other_price: Option<f64>,
    /// New cost, ignored while materials are present
    #[serde(default)]
    pub in_price: Option<f64>,
    /// New sale price, ignored while materials are present
    #[serde(default)]
    pub out_price: Option<f64>,
    /// New image reference
    #[serde(default)]
    pub image_path: Option<String>,
}

/// Cleans submitted lines into effective bill-of-materials lines.
///
/// Lines missing a material or a quantity, and zero-quantity lines, are dropped.
/// Duplicates are merged into the position of their first occurrence. A negative quantity
/// is rejected.
pub fn normalize_input(lines: &[LineInput]) -> Result<Vec<BomLine>> {
    let mut merged: Vec<BomLine> = Vec::new();
    for line in lines {
        let (Some(material_id), Some(required)) = (line.material_id, line.required_quantity)
        else {
            continue;
        };
        if required < 0 {
            return Err(Error::validation(format!(
                "Required quantity for material {material_id} cannot be negative"
            )));
        }
        if required == 0 {
            continue;
        }
        match merged.iter_mut().find(|l| l.material_id == material_id) {
            Some(existing) => {
                existing.required_quantity = existing
                    .required_quantity
                    .checked_add(required)
                    .ok_or_else(|| Error::validation("Required quantity is too large"))?;
            }
            None => merged.push(BomLine::new(material_id, required)),
        }
    }
    Ok(merged)
}

async fn find_product<C: ConnectionTrait>(db: &C, product_id: i64) -> Result<product::Model> {
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })
}

async fn ensure_unique_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
    except_id: Option<i64>,
) -> Result<()> {
    let mut query = Product::find().filter(product::Column::Name.eq(name));
    if let Some(id) = except_id {
        query = query.filter(product::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!("Product '{name}' already exists")));
    }
    Ok(())
}

/// Bill-of-materials rows of one product, in submission order.
pub(crate) async fn lines_of<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
) -> Result<Vec<product_material::Model>> {
    ProductMaterial::find()
        .filter(product_material::Column::ProductId.eq(product_id))
        .order_by_asc(product_material::Column::Position)
        .all(db)
        .await
        .map_err(Into::into)
}

pub(crate) async fn find_products_by_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[i64],
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Material rows keyed by id, limited to `ids`.
pub(crate) async fn materials_by_id<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = i64>,
) -> Result<HashMap<i64, material::Model>> {
    let ids: HashSet<i64> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(Material::find()
        .filter(material::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect())
}

async fn checked_lines<C: ConnectionTrait>(
    db: &C,
    input: &[LineInput],
) -> Result<(Vec<BomLine>, PriceTable)> {
    let lines = normalize_input(input)?;
    let materials = materials_by_id(db, lines.iter().map(|l| l.material_id)).await?;
    if let Some(missing) = lines.iter().find(|l| !materials.contains_key(&l.material_id)) {
        return Err(Error::validation(format!(
            "Material {} does not exist",
            missing.material_id
        )));
    }
    Ok((lines, views::price_table(materials.values())))
}

async fn replace_lines<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
    lines: &[BomLine],
) -> Result<()> {
    ProductMaterial::delete_many()
        .filter(product_material::Column::ProductId.eq(product_id))
        .exec(db)
        .await?;
    if lines.is_empty() {
        return Ok(());
    }
    let mut rows = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        rows.push(product_material::ActiveModel {
            product_id: Set(product_id),
            material_id: Set(line.material_id),
            position: Set(i32::try_from(position)?),
            required_quantity: Set(line.required_quantity),
            ..Default::default()
        });
    }
    ProductMaterial::insert_many(rows).exec(db).await?;
    Ok(())
}

/// Loads one product as served to clients.
pub(crate) async fn load_view<C: ConnectionTrait>(db: &C, product: product::Model) -> Result<ProductView> {
    let lines = lines_of(db, product.id).await?;
    let materials = materials_by_id(db, lines.iter().map(|l| l.material_id)).await?;
    Ok(ProductView::build(product, lines, &materials))
}

/// Re-derives and persists the prices of every product that uses `material_id`.
///
/// Runs on the caller's connection so a material price change and the repricing commit
/// together. Returns how many products were touched.
pub(crate) async fn reprice_products_using<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
) -> Result<usize> {
    let product_ids: Vec<i64> = ProductMaterial::find()
        .filter(product_material::Column::MaterialId.eq(material_id))
        .filter(product_material::Column::RequiredQuantity.gt(0))
        .select_only()
        .column(product_material::Column::ProductId)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;

    let now = Utc::now();
    for product in find_products_by_ids(db, &product_ids).await? {
        let lines = lines_of(db, product.id).await?;
        let materials = materials_by_id(db, lines.iter().map(|l| l.material_id)).await?;
        let bom: Vec<BomLine> = lines
            .iter()
            .map(|l| BomLine::new(l.material_id, l.required_quantity))
            .collect();
        let quote = pricing::effective_prices(
            &bom,
            &views::price_table(materials.values()),
            product.other_price,
            product.in_price,
            product.out_price,
        );
        debug!(
            "Repricing product '{}': cost {} -> {}, sale {} -> {}",
            product.name, product.in_price, quote.cost, product.out_price, quote.sale
        );
        let mut active: product::ActiveModel = product.into();
        active.in_price = Set(quote.cost);
        active.out_price = Set(quote.sale);
        active.updated_at = Set(now);
        active.update(db).await?;
    }
    Ok(product_ids.len())
}

/// Creates a product with zero stock.
///
/// # Errors
/// - `Validation` for a bad name, a negative price or quantity, or an unknown material
/// - `Conflict` when the name is taken
pub async fn create_product(
    db: &DatabaseConnection,
    input: NewProduct,
    username: &str,
    limits: &Limits,
) -> Result<ProductView> {
    let name = catalog::validate_name(&input.name, "Product", limits)?;
    let other_price = catalog::validate_price(input.other_price, "other_price")?;
    let in_price = catalog::validate_price(input.in_price, "in_price")?;
    let out_price = catalog::validate_price(input.out_price, "out_price")?;

    let txn = db.begin().await?;
    ensure_unique_name(&txn, &name, None).await?;
    let (lines, prices) = checked_lines(&txn, &input.materials).await?;
    let quote = pricing::effective_prices(&lines, &prices, other_price, in_price, out_price);

    let now = Utc::now();
    let created = product::ActiveModel {
        name: Set(name.clone()),
        other_price: Set(other_price),
        in_price: Set(quote.cost),
        out_price: Set(quote.sale),
        stock_count: Set(0),
        image_path: Set(input.image_path),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    replace_lines(&txn, created.id, &lines).await?;

    record::append_record(
        &txn,
        username,
        NewRecord::new(
            OperationType::ProductCreate,
            Some(created.id),
            &name,
            format!(
                "materials: {}, cost: {}, sale: {}",
                lines.len(),
                quote.cost,
                quote.sale
            ),
        ),
    )
    .await?;
    let view = load_view(&txn, created).await?;
    txn.commit().await?;

    info!("Created product '{}' (id {})", view.product.name, view.product.id);
    Ok(view)
}

/// Lists products ordered by id, whole or one page at a time.
pub async fn list_products<C: ConnectionTrait>(
    db: &C,
    paging: PageRequest,
    limits: &Limits,
) -> Result<Page<ProductView>> {
    let query = Product::find().order_by_asc(product::Column::Id);
    let (products, total, page, page_size) = if paging.is_paged() {
        let (page, page_size) = paging.resolve(limits);
        let total = query.clone().count(db).await?;
        let products = query
            .offset(catalog::page_offset(page, page_size)?)
            .limit(page_size)
            .all(db)
            .await?;
        (products, total, page, page_size)
    } else {
        let products = query.all(db).await?;
        let total = products.len() as u64;
        (products, total, 1, total.max(1))
    };

    let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
    let all_lines = ProductMaterial::find()
        .filter(product_material::Column::ProductId.is_in(ids))
        .all(db)
        .await?;
    let materials = materials_by_id(db, all_lines.iter().map(|l| l.material_id)).await?;

    let mut lines_by_product: HashMap<i64, Vec<product_material::Model>> = HashMap::new();
    for line in all_lines {
        lines_by_product.entry(line.product_id).or_default().push(line);
    }
    let items = products
        .into_iter()
        .map(|product| {
            let lines = lines_by_product.remove(&product.id).unwrap_or_default();
            ProductView::build(product, lines, &materials)
        })
        .collect();
    Ok(Page::new(items, total, page, page_size))
}

/// Fetches one product with its lines and derived fields.
pub async fn get_product<C: ConnectionTrait>(db: &C, product_id: i64) -> Result<ProductView> {
    let product = find_product(db, product_id).await?;
    load_view(db, product).await
}

/// Applies a partial update and re-derives prices.
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    changes: ProductChanges,
    username: &str,
    limits: &Limits,
) -> Result<ProductView> {
    let txn = db.begin().await?;
    let current = find_product(&txn, product_id).await?;
    let mut details = Vec::new();
    let mut active: product::ActiveModel = current.clone().into();

    if let Some(raw) = changes.name.as_deref() {
        let name = catalog::validate_name(raw, "Product", limits)?;
        if name != current.name {
            ensure_unique_name(&txn, &name, Some(product_id)).await?;
            details.push(format!("name: {} -> {name}", current.name));
            active.name = Set(name);
        }
    }

    let other_price = match changes.other_price {
        Some(value) => catalog::validate_price(value, "other_price")?,
        None => current.other_price,
    };
    if other_price.to_bits() != current.other_price.to_bits() {
        details.push(format!("other_price: {} -> {other_price}", current.other_price));
        active.other_price = Set(other_price);
    }
    let stored_in = match changes.in_price {
        Some(value) => catalog::validate_price(value, "in_price")?,
        None => current.in_price,
    };
    let stored_out = match changes.out_price {
        Some(value) => catalog::validate_price(value, "out_price")?,
        None => current.out_price,
    };

    let (lines, prices) = match changes.materials.as_deref() {
        Some(input) => {
            let (lines, prices) = checked_lines(&txn, input).await?;
            replace_lines(&txn, product_id, &lines).await?;
            details.push(format!("materials: {}", lines.len()));
            (lines, prices)
        }
        None => {
            let rows = lines_of(&txn, product_id).await?;
            let materials = materials_by_id(&txn, rows.iter().map(|l| l.material_id)).await?;
            let lines = rows
                .iter()
                .map(|l| BomLine::new(l.material_id, l.required_quantity))
                .collect();
            (lines, views::price_table(materials.values()))
        }
    };

    let quote = pricing::effective_prices(&lines, &prices, other_price, stored_in, stored_out);
    if quote.cost.to_bits() != current.in_price.to_bits()
        || quote.sale.to_bits() != current.out_price.to_bits()
    {
        details.push(format!("cost: {}, sale: {}", quote.cost, quote.sale));
    }
    active.in_price = Set(quote.cost);
    active.out_price = Set(quote.sale);

    if let Some(image_path) = changes.image_path {
        if current.image_path.as_deref() != Some(image_path.as_str()) {
            details.push("image updated".to_string());
            active.image_path = Set(Some(image_path));
        }
    }

    if details.is_empty() {
        txn.commit().await?;
        return get_product(db, product_id).await;
    }

    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    record::append_record(
        &txn,
        username,
        NewRecord::new(
            OperationType::ProductUpdate,
            Some(product_id),
            &updated.name,
            details.join(", "),
        ),
    )
    .await?;
    let view = load_view(&txn, updated).await?;
    txn.commit().await?;

    info!("Updated product '{}' (id {product_id})", view.product.name);
    Ok(view)
}

/// Deletes a product whose stock is zero, together with its bill of materials.
///
/// # Errors
/// - `ProductNotFound` for an unknown id
/// - `Conflict` while units are still in stock
pub async fn delete_product(db: &DatabaseConnection, product_id: i64, username: &str) -> Result<()> {
    let txn = db.begin().await?;
    let product = find_product(&txn, product_id).await?;
    if product.stock_count != 0 {
        warn!(
            "Refused to delete product '{}' with {} unit(s) in stock",
            product.name, product.stock_count
        );
        return Err(Error::conflict(format!(
            "Product '{}' still has {} unit(s) in stock",
            product.name, product.stock_count
        )));
    }

    ProductMaterial::delete_many()
        .filter(product_material::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    Product::delete_by_id(product_id).exec(&txn).await?;
    record::append_record(
        &txn,
        username,
        NewRecord::new(
            OperationType::ProductDelete,
            Some(product_id),
            &product.name,
            "deleted",
        ),
    )
    .await?;
    txn.commit().await?;

    info!("Deleted product '{}' (id {product_id})", product.name);
    Ok(())
}

/// Deletes each product it can and reports the rest.
pub async fn batch_delete_products(
    db: &DatabaseConnection,
    ids: &[i64],
    username: &str,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for &id in ids {
        let name = Product::find_by_id(id).one(db).await?.map(|p| p.name);
        let result = delete_product(db, id, username).await;
        outcome.push(id, name, result)?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_normalize_input_drops_and_merges() -> Result<()> {
        let lines = normalize_input(&[
            LineInput::new(3, 2),
            LineInput {
                material_id: None,
                required_quantity: Some(5),
            },
            LineInput::new(1, 0),
            LineInput::new(2, 1),
            LineInput::new(3, 4),
            LineInput {
                material_id: Some(9),
                required_quantity: None,
            },
        ])?;
        assert_eq!(lines, vec![BomLine::new(3, 6), BomLine::new(2, 1)]);
        Ok(())
    }

    #[test]
    fn test_normalize_input_rejects_negative() {
        let result = normalize_input(&[LineInput::new(1, -1)]);
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_create_product_validation_leaves_no_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let limits = Limits::default();

        let result = create_product(
            &db,
            NewProduct {
                name: "   ".to_string(),
                ..NewProduct::default()
            },
            "tester",
            &limits,
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_product(
            &db,
            NewProduct {
                name: "Bread".to_string(),
                other_price: f64::NAN,
                ..NewProduct::default()
            },
            "tester",
            &limits,
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        assert_eq!(Product::find().count(&db).await?, 0);
        assert_eq!(crate::entities::OperationRecord::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_scenario_derived_prices() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_material(&db, "A", 2.0, 3.0).await?;
        stock_material(&db, a.material.id, 10).await?;
        let p = create_test_product(&db, "P", &[(a.material.id, 2)], 1.0).await?;

        let view = get_product(&db, p.product.id).await?;
        assert_eq!(view.cost, 4.0);
        assert_eq!(view.sale, 7.0);
        assert_eq!(view.possible_quantity, Some(5));
        // Persisted prices match the derived ones
        assert_eq!(view.product.in_price, 4.0);
        assert_eq!(view.product.out_price, 7.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_ignores_prices_with_materials() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_material(&db, "A", 2.0, 3.0).await?;
        let view = create_product(
            &db,
            NewProduct {
                name: "P".to_string(),
                materials: vec![LineInput::new(a.material.id, 1)],
                other_price: 0.5,
                in_price: 100.0,
                out_price: 100.0,
                image_path: None,
            },
            "tester",
            &Limits::default(),
        )
        .await?;
        assert_eq!(view.product.in_price, 2.0);
        assert_eq!(view.product.out_price, 3.5);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_without_materials_keeps_prices() -> Result<()> {
        let db = setup_test_db().await?;
        let view = create_product(
            &db,
            NewProduct {
                name: "Gift card".to_string(),
                in_price: 8.0,
                out_price: 10.0,
                ..NewProduct::default()
            },
            "tester",
            &Limits::default(),
        )
        .await?;
        assert_eq!(view.cost, 8.0);
        assert_eq!(view.sale, 10.0);
        assert_eq!(view.possible_quantity, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_unknown_material() -> Result<()> {
        let db = setup_test_db().await?;
        let result = create_test_product(&db, "P", &[(42, 1)], 0.0).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert!(Product::find().all(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_product_rederives_on_line_change() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_material(&db, "A", 2.0, 3.0).await?;
        let b = create_test_material(&db, "B", 1.0, 1.5).await?;
        let p = create_test_product(&db, "P", &[(a.material.id, 2)], 1.0).await?;

        let view = update_product(
            &db,
            p.product.id,
            ProductChanges {
                materials: Some(vec![
                    LineInput::new(b.material.id, 2),
                    LineInput::new(a.material.id, 1),
                ]),
                other_price: Some(0.0),
                in_price: Some(99.0),
                ..ProductChanges::default()
            },
            "tester",
            &Limits::default(),
        )
        .await?;
        assert_eq!(view.cost, 4.0);
        assert_eq!(view.sale, 6.0);
        assert_eq!(view.materials[0].material_id, b.material.id);
        assert_eq!(view.materials[1].material_id, a.material.id);
        assert_eq!(count_records(&db, OperationType::ProductUpdate).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_product_clearing_materials_restores_stored_prices() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_material(&db, "A", 2.0, 3.0).await?;
        let p = create_test_product(&db, "P", &[(a.material.id, 2)], 1.0).await?;

        let view = update_product(
            &db,
            p.product.id,
            ProductChanges {
                materials: Some(Vec::new()),
                in_price: Some(5.0),
                out_price: Some(9.0),
                ..ProductChanges::default()
            },
            "tester",
            &Limits::default(),
        )
        .await?;
        assert!(view.materials.is_empty());
        assert_eq!(view.cost, 5.0);
        assert_eq!(view.sale, 9.0);

        // Material is no longer in use and can go
        crate::core::material::delete_material(&db, a.material.id, "tester").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_requires_zero_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_material(&db, "A", 2.0, 3.0).await?;
        stock_material(&db, a.material.id, 10).await?;
        let p = create_test_product(&db, "P", &[(a.material.id, 2)], 1.0).await?;
        build_product(&db, p.product.id, 1).await?;

        let result = delete_product(&db, p.product.id, "tester").await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        let outcome = batch_delete_products(&db, &[p.product.id], "tester").await?;
        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.failed[0].name.as_deref(), Some("P"));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_removes_lines() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_material(&db, "A", 2.0, 3.0).await?;
        let p = create_test_product(&db, "P", &[(a.material.id, 2)], 1.0).await?;

        delete_product(&db, p.product.id, "tester").await?;
        assert!(ProductMaterial::find().all(&db).await?.is_empty());
        assert!(matches!(
            get_product(&db, p.product.id).await,
            Err(Error::ProductNotFound { .. })
        ));
        assert_eq!(count_records(&db, OperationType::ProductDelete).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_products_refetch_is_stable() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_material(&db, "A", 0.1, 0.35).await?;
        let b = create_test_material(&db, "B", 0.2, 0.7).await?;
        create_test_product(&db, "P", &[(b.material.id, 7), (a.material.id, 3)], 0.3).await?;
        create_test_product(&db, "Q", &[(a.material.id, 3), (b.material.id, 7)], 0.3).await?;

        let first = list_products(&db, PageRequest::default(), &Limits::default()).await?;
        let second = list_products(&db, PageRequest::default(), &Limits::default()).await?;
        assert_eq!(
            serde_json::to_string(&first.items)?,
            serde_json::to_string(&second.items)?
        );
        // Order of lines does not affect the derived values
        assert_eq!(first.items[0].cost.to_bits(), first.items[1].cost.to_bits());
        assert_eq!(first.items[0].sale.to_bits(), first.items[1].sale.to_bits());
        Ok(())
    }
}
