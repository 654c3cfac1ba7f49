//! Material entity - Represents a purchasable, stockable input item.
//!
//! Each material has a unique name, an in-price (cost), an out-price (sale) and a stock
//! count that never goes negative. Products reference materials through their
//! bill-of-materials lines.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Material database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    /// Unique identifier for the material
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable name, unique across materials
    #[sea_orm(unique)]
    pub name: String,
    /// Purchase cost per unit
    pub in_price: f64,
    /// Sale price per unit
    pub out_price: f64,
    /// Units on hand, never negative
    pub stock_count: i64,
    /// Opaque reference to an uploaded image
    pub image_path: Option<String>,
    /// When the material was created
    pub created_at: DateTimeUtc,
    /// When the material was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Material and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One material appears in many bill-of-materials lines
    #[sea_orm(has_many = "super::product_material::Entity")]
    ProductMaterials,
}

impl Related<super::product_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductMaterials.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
