//! Operation record entity - Append-only audit trail of every mutating action.
//!
//! Records are written in the same database transaction as the change they describe and
//! are never updated or deleted afterwards.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operation record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operation_records")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Operation type in `snake_case` (e.g. `"material_in"`, `"product_out"`)
    pub operation_type: String,
    /// Id of the material, product or user the operation touched
    pub subject_id: Option<i64>,
    /// Name of the subject at the time of the operation
    pub name: String,
    /// Signed quantity, negative for out-bound movements
    pub quantity: i64,
    /// Informational revenue (`price * quantity`) for out-bound operations
    pub amount: Option<f64>,
    /// Free-form description of the change
    pub detail: String,
    /// User who performed the operation
    pub username: String,
    /// When the operation happened
    pub created_at: DateTimeUtc,
}

/// Records are standalone and reference their subject by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
