//! Collects scan results from parallel container tasks into one ordered snapshot.

use indexmap::IndexSet;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{info, warn};
use weave_container::EntryName;
use weave_domain::config::DiscoveryOrder;
use weave_domain::names::QualifiedName;

/// Deduplicated, insertion-ordered set of discovered unit names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySet {
    names: IndexSet<QualifiedName>,
}

impl DiscoverySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` unless already present. Returns whether it was new.
    pub fn record(&mut self, name: QualifiedName) -> bool {
        self.names.insert(name)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<QualifiedName> {
        self.names.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QualifiedName> {
        self.names.iter()
    }

    fn sort(&mut self) {
        self.names.sort();
    }
}

/// Where the registry class was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLocation {
    /// Position of the container in the build invocation.
    pub container: usize,
    pub entry: EntryName,
}

/// The finalized result of the scan phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySnapshot {
    pub names: Vec<QualifiedName>,
    pub registry: Option<RegistryLocation>,
}

#[derive(Debug, Default)]
struct State {
    buffers: BTreeMap<usize, DiscoverySet>,
    registry: Option<RegistryLocation>,
}

/// Shared sink for container scan tasks.
///
/// Matches are buffered per container so that [`Aggregator::finalize`] can merge them
/// in input order no matter which task finished first.
#[derive(Debug, Default)]
pub struct Aggregator {
    state: Mutex<State>,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, container: usize, name: QualifiedName) {
        self.state.lock().buffers.entry(container).or_default().record(name);
    }

    /// Remembers where the registry lives. When several containers hold it, the one
    /// that comes first in the invocation wins.
    pub fn locate_registry(&self, location: RegistryLocation) {
        let mut state = self.state.lock();
        match &state.registry {
            None => state.registry = Some(location),
            Some(known) => {
                let (kept, ignored) = if location.container < known.container {
                    (location.clone(), known.clone())
                } else {
                    (known.clone(), location)
                };
                warn!(
                    kept = kept.container,
                    ignored = ignored.container,
                    entry = %ignored.entry,
                    "Registry class found in more than one container"
                );
                state.registry = Some(kept);
            },
        }
    }

    /// Merges the per-container buffers. Call only after every scan task has finished.
    #[must_use]
    pub fn finalize(&self, order: DiscoveryOrder) -> DiscoverySnapshot {
        let state = self.state.lock();

        let mut merged = DiscoverySet::new();
        for buffer in state.buffers.values() {
            for name in buffer.iter() {
                merged.record(name.clone());
            }
        }
        if order == DiscoveryOrder::Sorted {
            merged.sort();
        }

        info!(
            discovered = merged.len(),
            registry = state.registry.is_some(),
            "Discovery finalized"
        );
        DiscoverySnapshot { names: merged.snapshot(), registry: state.registry.clone() }
    }
}
