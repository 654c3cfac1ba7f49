//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod material;
pub mod operation_record;
pub mod product;
pub mod product_material;
pub mod user;
pub mod user_session;

// Re-export specific types to avoid conflicts
pub use material::{Column as MaterialColumn, Entity as Material, Model as MaterialModel};
pub use operation_record::{
    Column as OperationRecordColumn, Entity as OperationRecord, Model as OperationRecordModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use product_material::{
    Column as ProductMaterialColumn, Entity as ProductMaterial, Model as ProductMaterialModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use user_session::{
    Column as UserSessionColumn, Entity as UserSession, Model as UserSessionModel,
};
