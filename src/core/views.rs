//! Derived views - read-only values computed from persisted rows on every fetch.
//!
//! Nothing in here is stored. `used_by_products`, `possible_quantity`, product cost and sale
//! and the stock value aggregates are recomputed from the current material and
//! bill-of-materials rows, so re-fetching without intervening mutations always yields the
//! same numbers.

use crate::core::pricing::{self, BomLine, MaterialPrice, PriceQuote, PriceTable};
use crate::entities::{material, product, product_material};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Material as served to clients: the stored row plus derived usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialView {
    /// Stored material row
    #[serde(flatten)]
    pub material: material::Model,
    /// Number of distinct products whose bill of materials needs this material
    pub used_by_products: usize,
}

impl MaterialView {
    /// True when any product still needs this material.
    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.used_by_products > 0
    }
}

/// One bill-of-materials line annotated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLineView {
    /// Referenced material
    pub material_id: i64,
    /// Material name, `None` when the material no longer exists
    pub material_name: Option<String>,
    /// Units consumed per unit of product
    pub required_quantity: i64,
    /// Current stock of the material (0 when missing)
    pub stock_count: i64,
}

/// Product as served to clients: the stored row, its lines and derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    /// Stored product row
    #[serde(flatten)]
    pub product: product::Model,
    /// Bill of materials in submission order
    pub materials: Vec<ProductLineView>,
    /// Derived (or stored, for an empty bill of materials) cost
    pub cost: f64,
    /// Derived (or stored, for an empty bill of materials) sale price
    pub sale: f64,
    /// Units buildable from current material stock, `None` without materials
    pub possible_quantity: Option<i64>,
}

impl ProductView {
    /// Builds a view from the stored row, its lines (any order) and the material table.
    #[must_use]
    pub fn build(
        product: product::Model,
        mut lines: Vec<product_material::Model>,
        materials: &HashMap<i64, material::Model>,
    ) -> Self {
        lines.sort_by_key(|line| line.position);
        let materials_view = lines
            .iter()
            .map(|line| {
                let material = materials.get(&line.material_id);
                ProductLineView {
                    material_id: line.material_id,
                    material_name: material.map(|m| m.name.clone()),
                    required_quantity: line.required_quantity,
                    stock_count: material.map_or(0, |m| m.stock_count),
                }
            })
            .collect();

        let mut view = Self {
            product,
            materials: materials_view,
            cost: 0.0,
            sale: 0.0,
            possible_quantity: None,
        };
        view.rederive(&price_table(materials.values()), &stock_table(materials.values()));
        view
    }

    /// Bill of materials as engine input.
    #[must_use]
    pub fn bom_lines(&self) -> Vec<BomLine> {
        self.materials
            .iter()
            .map(|line| BomLine::new(line.material_id, line.required_quantity))
            .collect()
    }

    /// Recomputes cost, sale and possible quantity against fresh material tables.
    pub fn rederive(&mut self, prices: &PriceTable, stock: &HashMap<i64, i64>) {
        let lines = self.bom_lines();
        let PriceQuote { cost, sale } = pricing::effective_prices(
            &lines,
            prices,
            self.product.other_price,
            self.product.in_price,
            self.product.out_price,
        );
        self.cost = cost;
        self.sale = sale;
        self.possible_quantity = possible_quantity(&lines, stock);
        for line in &mut self.materials {
            line.stock_count = stock.get(&line.material_id).copied().unwrap_or(0);
        }
    }
}

/// Builds the engine's price table from material rows.
pub fn price_table<'a>(materials: impl IntoIterator<Item = &'a material::Model>) -> PriceTable {
    materials
        .into_iter()
        .map(|m| {
            (
                m.id,
                MaterialPrice {
                    in_price: m.in_price,
                    out_price: m.out_price,
                },
            )
        })
        .collect()
}

/// Builds a `material_id -> stock_count` table from material rows.
pub fn stock_table<'a>(
    materials: impl IntoIterator<Item = &'a material::Model>,
) -> HashMap<i64, i64> {
    materials
        .into_iter()
        .map(|m| (m.id, m.stock_count))
        .collect()
}

/// Maximum units buildable from current stock.
///
/// `min over lines of floor(stock / required)`. Returns `None` when the bill of materials
/// has no effective lines, and 0 for any line whose material no longer exists.
#[must_use]
pub fn possible_quantity(lines: &[BomLine], stock: &HashMap<i64, i64>) -> Option<i64> {
    pricing::normalize_lines(lines)
        .into_iter()
        .map(|(material_id, required)| {
            let on_hand = stock.get(&material_id).copied().unwrap_or(0).max(0);
            on_hand / required
        })
        .min()
}

/// Counts, per material, the distinct products that need it with positive quantity.
#[must_use]
pub fn used_by_counts(lines: &[product_material::Model]) -> HashMap<i64, usize> {
    let mut users: HashMap<i64, HashSet<i64>> = HashMap::new();
    for line in lines.iter().filter(|line| line.required_quantity > 0) {
        users
            .entry(line.material_id)
            .or_default()
            .insert(line.product_id);
    }
    users
        .into_iter()
        .map(|(material_id, products)| (material_id, products.len()))
        .collect()
}

/// Number of distinct products that need `material_id`.
#[must_use]
pub fn used_by_products(material_id: i64, lines: &[product_material::Model]) -> usize {
    lines
        .iter()
        .filter(|line| line.material_id == material_id && line.required_quantity > 0)
        .map(|line| line.product_id)
        .collect::<HashSet<_>>()
        .len()
}

/// Display aggregate `Σ stock_count × out_price` over materials.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn total_material_value<'a>(materials: impl IntoIterator<Item = &'a MaterialView>) -> f64 {
    materials
        .into_iter()
        .map(|view| view.material.stock_count as f64 * view.material.out_price)
        .sum()
}

/// Display aggregate `Σ stock_count × derived sale` over products.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn total_product_value<'a>(products: impl IntoIterator<Item = &'a ProductView>) -> f64 {
    products
        .into_iter()
        .map(|view| view.product.stock_count as f64 * view.sale)
        .sum()
}
