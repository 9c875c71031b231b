//! Domain records for the catalog and user accounts.
//!
//! # Responsibility
//! - Define canonical data structures used by repositories and services.
//! - Own field-level validation that must hold before persistence.
//!
//! # Invariants
//! - Records are identified by SQLite row ids assigned at insert time.
//! - Write paths call `validate()` before issuing SQL.

pub mod catalog;
pub mod user;
