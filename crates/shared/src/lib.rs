//! Shared types, errors, and configuration for Outlay.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - `Reference`, the id-or-record normalization used for foreign keys
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use types::{Identified, InvalidReference, Reference};
