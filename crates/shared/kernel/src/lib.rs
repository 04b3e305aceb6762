//! Kernel utilities shared across the pipeline crates.
//! Keep this crate lightweight; it owns configuration loading and re-exports the domain.
//!
//! ## Config loading
//! ```rust,no_run
//! use weave_kernel::config::load_weave_config;
//!
//! let cfg = load_weave_config(Some("weave.toml")).unwrap();
//! assert!(cfg.workers >= 1);
//! ```
pub mod config;

pub use weave_domain as domain;
