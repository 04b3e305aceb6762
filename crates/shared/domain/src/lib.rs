//! # Domain Models
//!
//! This crate contains pure domain types with minimal dependencies (`serde`, `bitflags`).
//! Keep it lean: no I/O or heavy logic, just data, defaults and name validation.

pub mod config;
pub mod constants;
pub mod invocation;
pub mod names;
pub mod scope;
