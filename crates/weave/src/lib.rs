//! # Weave
//!
//! Build-time registration weaving for compiled JVM units.
//!
//! Independently built modules ship adapter classes that implement one marker
//! interface. Weave scans every container of a build, finds those adapters, and
//! rewrites the registry class so that its initialization routine constructs and
//! registers each of them. No reflection at runtime.
//!
//! The facade composes the pipeline crates and re-exports what build hosts need:
//!
//! - [`Pipeline`]: runs one [`BuildInvocation`](domain::invocation::BuildInvocation).
//! - [`OutputResolver`] / [`OutputLayout`]: where forwarded containers go.
//! - [`BuildReport`]: what happened.

mod context;
mod error;
mod output;
mod pipeline;
mod report;

pub use weave_classfile as classfile;
pub use weave_container as container;
pub use weave_discovery as discovery;
pub use weave_domain as domain;
pub use weave_kernel as kernel;
pub use weave_patcher as patcher;

pub use crate::context::BuildContext;
pub use crate::error::{PipelineError, PipelineErrorExt};
pub use crate::output::{OutputLayout, OutputResolver};
pub use crate::pipeline::{Pipeline, run};
pub use crate::report::{BuildReport, RegistryReport};
