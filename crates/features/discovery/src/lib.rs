//! # Discovery
//!
//! Finds the compiled units that directly implement the marker interface, and the
//! one registry class that will receive them.
//!
//! 1. **[`classify`]**: stateless predicates, one per classification step.
//! 2. **[`Scanner`]**: composes the predicates per entry and drives them over a
//!    whole container.
//! 3. **[`Aggregator`]**: shared by parallel scan tasks; merges their results into a
//!    [`DiscoverySnapshot`] once every task is done.

pub mod aggregator;
pub mod classify;
mod error;
pub mod scanner;

pub use crate::aggregator::{Aggregator, DiscoverySet, DiscoverySnapshot, RegistryLocation};
pub use crate::error::{DiscoveryError, DiscoveryErrorExt};
pub use crate::scanner::{ScanStats, Scanner, SkipReason, Verdict};
