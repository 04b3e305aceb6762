use crate::constants::{
    DEFAULT_EXCLUSIONS, DEFAULT_FIELD, DEFAULT_FIELD_DESCRIPTOR, DEFAULT_MARKER,
    DEFAULT_METHOD, DEFAULT_METHOD_DESCRIPTOR, DEFAULT_PREFIX, DEFAULT_REGISTRY,
    DEFAULT_ROUTINE,
};
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Recognised options of one weave run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfigInner {
    /// Interface whose direct implementors get registered.
    pub marker: String,
    pub registry: RegistryConfig,
    pub scan: ScanConfig,
    /// Fail the build when no container holds the registry class.
    pub require_registry: bool,
    /// Upper bound on containers processed at once.
    pub workers: usize,
}

/// Thin Arc-wrapped config for inexpensive cloning into worker tasks.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaveConfig {
    #[serde(flatten, default)]
    inner: Arc<WeaveConfigInner>,
}

impl Deref for WeaveConfig {
    type Target = WeaveConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for WeaveConfig {
    fn deref_mut(&mut self) -> &mut WeaveConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

impl From<WeaveConfigInner> for WeaveConfig {
    fn from(inner: WeaveConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

/// The class that receives registrations, and how it receives them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Qualified name of the registry class.
    #[serde(rename = "class")]
    pub class_name: String,
    pub routine: String,
    /// Narrows the routine match; every overload named `routine` is patched when unset.
    pub routine_descriptor: Option<String>,
    pub field: String,
    pub field_descriptor: String,
    pub method: String,
    pub method_descriptor: String,
}

/// Which entries are inspected and in which order matches are reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub prefix: String,
    /// Glob rules matched against the simple class name.
    pub exclusions: Vec<String>,
    pub scopes: Scope,
    pub order: DiscoveryOrder,
}

/// Order of the finalized discovery set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryOrder {
    /// Container input order, then entry order within each container.
    #[default]
    ScanOrder,
    /// Lexicographic by qualified name.
    Sorted,
}

// --- Default ---

impl Default for WeaveConfigInner {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_owned(),
            registry: RegistryConfig::default(),
            scan: ScanConfig::default(),
            require_registry: false,
            workers: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            class_name: DEFAULT_REGISTRY.to_owned(),
            routine: DEFAULT_ROUTINE.to_owned(),
            routine_descriptor: None,
            field: DEFAULT_FIELD.to_owned(),
            field_descriptor: DEFAULT_FIELD_DESCRIPTOR.to_owned(),
            method: DEFAULT_METHOD.to_owned(),
            method_descriptor: DEFAULT_METHOD_DESCRIPTOR.to_owned(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| (*s).to_owned()).collect(),
            scopes: Scope::ALL,
            order: DiscoveryOrder::ScanOrder,
        }
    }
}
