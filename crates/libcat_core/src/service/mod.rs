//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Apply authorization before catalog use-cases touch storage.
//! - Keep HTTP adapters decoupled from storage details.

pub mod account_service;
pub mod catalog_service;
pub mod form;
