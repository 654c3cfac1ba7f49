//! Bill-of-materials line entity - one `(product, material, quantity)` row.
//!
//! `position` keeps the order in which lines were submitted so a product renders its
//! materials the way they were entered.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bill-of-materials line database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_materials")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning product
    pub product_id: i64,
    /// Referenced material
    pub material_id: i64,
    /// Zero-based order within the product
    pub position: i32,
    /// Units of the material consumed per unit of product
    pub required_quantity: i64,
}

/// Defines relationships between a line and its product and material
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    /// Each line references one material
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
