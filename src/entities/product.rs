//! Product entity - Represents a sellable item, optionally built from materials.
//!
//! When a product has bill-of-materials lines its `in_price` and `out_price` are derived
//! from the referenced materials and kept in sync by the server. Without lines they are
//! stored as entered.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable name, unique across products
    #[sea_orm(unique)]
    pub name: String,
    /// Flat add-on charged on top of the material sale prices
    pub other_price: f64,
    /// Cost per unit (derived while the bill of materials is non-empty)
    pub in_price: f64,
    /// Sale price per unit (derived while the bill of materials is non-empty)
    pub out_price: f64,
    /// Built units on hand, never negative
    pub stock_count: i64,
    /// Opaque reference to an uploaded image
    pub image_path: Option<String>,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many bill-of-materials lines
    #[sea_orm(has_many = "super::product_material::Entity")]
    ProductMaterials,
}

impl Related<super::product_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductMaterials.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
