//! # Registry Patcher
//!
//! Turns the finalized discovery list into bytecode: each discovered unit is
//! constructed with its no-argument constructor and handed the registry's
//! registration field, right before every return of the registry's
//! initialization routine.
//!
//! ```rust
//! use weave_domain::config::RegistryConfig;
//! use weave_patcher::{PatchPlan, patch_registry};
//!
//! // nothing discovered: the payload comes back untouched, without being decoded
//! let plan = PatchPlan::from_config(&RegistryConfig::default(), Vec::new())?;
//! let patched = patch_registry(b"any payload", &plan)?;
//! assert_eq!(patched.payload, b"any payload");
//! # Ok::<(), weave_patcher::PatchError>(())
//! ```

mod error;
mod patch;
mod plan;

pub use crate::error::{PatchError, PatchErrorExt};
pub use crate::patch::{Patched, patch_registry};
pub use crate::plan::{PatchPlan, RegistryTarget};
