//! Shared test utilities for Stockroom.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::{Limits, SessionSettings},
    core::{
        ledger::{self, LedgerReceipt, MaterialInRequest, ProductInRequest, ProductOutRequest},
        material::{self, NewMaterial},
        product::{self, LineInput, NewProduct},
        record::OperationType,
        user::{self, SessionUser},
        views::{MaterialView, ProductView},
    },
    entities::{OperationRecord, operation_record},
    errors::Result,
};
use sea_orm::{DatabaseConnection, PaginatorTrait, prelude::*};

/// Username written on records by the helpers.
pub const TEST_USER: &str = "tester";

/// Password given to the seeded administrator in tests.
pub const TEST_ADMIN_PASSWORD: &str = "admin-secret";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test material with the given prices and zero stock.
pub async fn create_test_material(
    db: &DatabaseConnection,
    name: &str,
    in_price: f64,
    out_price: f64,
) -> Result<MaterialView> {
    material::create_material(
        db,
        NewMaterial {
            name: name.to_string(),
            in_price,
            out_price: Some(out_price),
            image_path: None,
        },
        TEST_USER,
        &Limits::default(),
    )
    .await
}

/// Creates a test product from `(material_id, required_quantity)` pairs.
///
/// # Defaults
/// * stored `in_price`/`out_price`: 0.0 (only used without materials)
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    lines: &[(i64, i64)],
    other_price: f64,
) -> Result<ProductView> {
    product::create_product(
        db,
        NewProduct {
            name: name.to_string(),
            materials: lines
                .iter()
                .map(|&(material_id, qty)| LineInput::new(material_id, qty))
                .collect(),
            other_price,
            ..NewProduct::default()
        },
        TEST_USER,
        &Limits::default(),
    )
    .await
}

/// Receives `quantity` units of a material.
pub async fn stock_material(
    db: &DatabaseConnection,
    material_id: i64,
    quantity: i64,
) -> Result<LedgerReceipt> {
    ledger::material_in(
        db,
        MaterialInRequest {
            material_id,
            quantity,
            supplier: None,
        },
        TEST_USER,
        &Limits::default(),
    )
    .await
}

/// Builds `quantity` units of a product.
pub async fn build_product(
    db: &DatabaseConnection,
    product_id: i64,
    quantity: i64,
) -> Result<LedgerReceipt> {
    ledger::product_in(
        db,
        ProductInRequest {
            product_id,
            quantity,
            customer: None,
        },
        TEST_USER,
        &Limits::default(),
    )
    .await
}

/// Ships `quantity` units of a product at its derived sale price.
pub async fn ship_product(
    db: &DatabaseConnection,
    product_id: i64,
    quantity: i64,
) -> Result<LedgerReceipt> {
    ledger::product_out(
        db,
        ProductOutRequest {
            product_id,
            quantity,
            price: None,
            customer: None,
        },
        TEST_USER,
        &Limits::default(),
    )
    .await
}

/// Counts the records of one operation type.
pub async fn count_records(db: &DatabaseConnection, operation: OperationType) -> Result<u64> {
    OperationRecord::find()
        .filter(operation_record::Column::OperationType.eq(operation.as_str()))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Seeds the administrator and returns a live admin session.
pub async fn admin_session(db: &DatabaseConnection) -> Result<SessionUser> {
    let settings = SessionSettings {
        admin_password: Some(TEST_ADMIN_PASSWORD.to_string()),
        ..SessionSettings::default()
    };
    user::seed_admin(db, &settings).await?;
    let outcome = user::login(db, &settings.admin_username, TEST_ADMIN_PASSWORD, &settings).await?;
    user::authenticate(db, &outcome.token, &settings).await
}
