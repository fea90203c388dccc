//! `SeaORM` entity definitions.
//!
//! Status and type columns are stored as their snake_case names and mapped
//! to the core enums by [`crate::store`].

pub mod approval_requests;
pub mod approval_rules;
pub mod companies;
pub mod expenses;
pub mod users;
