//! Core business logic - framework-agnostic inventory operations.
//!
//! The pricing engine and derived views are pure functions; the remaining modules take a
//! `SeaORM` connection and run each mutation in a single database transaction.

pub mod catalog;
pub mod ledger;
pub mod material;
pub mod pricing;
pub mod product;
pub mod record;
pub mod statistics;
pub mod user;
pub mod views;
