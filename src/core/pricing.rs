//! Pricing engine - derives a product's cost and sale price from its bill of materials.
//!
//! Everything here is a pure function over in-memory values so the same code runs on the
//! server (when persisting derived prices) and on the client (when recomputing display
//! values after a reload). Lines are normalized into a map ordered by material id before
//! summing, which makes the result bit-identical for any permutation of the input.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One bill-of-materials entry as submitted or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    /// Referenced material
    pub material_id: i64,
    /// Units of the material consumed per unit of product
    pub required_quantity: i64,
}

impl BomLine {
    /// Creates a line.
    #[must_use]
    pub const fn new(material_id: i64, required_quantity: i64) -> Self {
        Self {
            material_id,
            required_quantity,
        }
    }
}

/// Price pair of one material, as looked up by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialPrice {
    /// Purchase cost per unit
    pub in_price: f64,
    /// Sale price per unit
    pub out_price: f64,
}

/// Material id to price lookup table.
pub type PriceTable = HashMap<i64, MaterialPrice>;

/// Result of a price derivation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Cost per unit of product
    pub cost: f64,
    /// Sale price per unit of product
    pub sale: f64,
}

/// Collapses lines into `material_id -> total required`, dropping non-positive quantities.
///
/// Duplicate material ids are merged by summing. The `BTreeMap` fixes iteration order.
#[must_use]
pub fn normalize_lines(lines: &[BomLine]) -> BTreeMap<i64, i64> {
    let mut normalized = BTreeMap::new();
    for line in lines.iter().filter(|line| line.required_quantity > 0) {
        *normalized.entry(line.material_id).or_insert(0) += line.required_quantity;
    }
    normalized
}

/// True when the lines contain at least one effective (positive-quantity) entry.
#[must_use]
pub fn has_effective_lines(lines: &[BomLine]) -> bool {
    lines.iter().any(|line| line.required_quantity > 0)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Derives cost and sale from the bill of materials.
///
/// `cost = Σ required × in_price`, `sale = Σ required × out_price + other_price`.
/// Materials missing from `prices` contribute nothing: they have since been deleted.
#[must_use]
pub fn derive_prices(lines: &[BomLine], prices: &PriceTable, other_price: f64) -> PriceQuote {
    let mut cost = 0.0;
    let mut sale = 0.0;
    for (material_id, required) in normalize_lines(lines) {
        let Some(price) = prices.get(&material_id) else {
            continue;
        };
        #[allow(clippy::cast_precision_loss)]
        let required = required as f64;
        cost += required * finite_or_zero(price.in_price);
        sale += required * finite_or_zero(price.out_price);
    }
    PriceQuote {
        cost,
        sale: sale + finite_or_zero(other_price),
    }
}

/// Returns the prices a product should carry.
///
/// With effective lines the derived quote wins and the stored prices are ignored. With an
/// empty bill of materials the stored `in_price`/`out_price` are authoritative.
#[must_use]
pub fn effective_prices(
    lines: &[BomLine],
    prices: &PriceTable,
    other_price: f64,
    stored_in_price: f64,
    stored_out_price: f64,
) -> PriceQuote {
    if has_effective_lines(lines) {
        derive_prices(lines, prices, other_price)
    } else {
        PriceQuote {
            cost: stored_in_price,
            sale: stored_out_price,
        }
    }
}

/// Rounds a money value to cents for display payloads.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
