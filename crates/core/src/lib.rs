//! Core business logic for Outlay.
//!
//! This crate contains the expense approval workflow engine with ZERO web or
//! database dependencies. Persistence and user lookup are reached through
//! the traits in [`workflow::store`].
//!
//! # Modules
//!
//! - `workflow` - Approval rules, approval requests and the expense state machine

pub mod workflow;
