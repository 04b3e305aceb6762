//! Per-entry classification and the per-container scan driver.

use crate::aggregator::{Aggregator, RegistryLocation};
use crate::classify::{declares_marker, is_excluded, is_unit_entry, within_prefix};
use crate::error::{DiscoveryError, DiscoveryErrorExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, trace};
use weave_classfile::ClassHeader;
use weave_container::{Container, EntryName};
use weave_domain::config::WeaveConfig;
use weave_domain::names::{QualifiedName, normalize_prefix};

/// Why an entry was not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAUnit,
    Excluded,
    OutsidePrefix,
}

/// Outcome of classifying one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Skipped(SkipReason),
    /// The entry is the registry class.
    Registry,
    /// A unit that directly implements the marker.
    Match(QualifiedName),
    /// A decoded unit that does not implement the marker.
    NoMatch,
}

impl Verdict {
    /// Whether producing this verdict required decoding the unit header.
    #[must_use]
    pub const fn decoded(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}

/// Counters of one container scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub entries: usize,
    pub decoded: usize,
    pub matches: usize,
}

/// Classifies entries against one configuration. Immutable and shareable across tasks.
#[derive(Debug, Clone)]
pub struct Scanner {
    marker: QualifiedName,
    registry: QualifiedName,
    registry_entry: String,
    prefix: String,
    exclusions: GlobSet,
}

impl Scanner {
    /// # Errors
    /// Returns [`DiscoveryError::InvalidName`] for a malformed marker or registry name and
    /// [`DiscoveryError::InvalidPattern`] for an exclusion rule that is not a valid glob.
    pub fn new(config: &WeaveConfig) -> Result<Self, DiscoveryError> {
        let marker = QualifiedName::parse(&config.marker).context("marker")?;
        let registry = QualifiedName::parse(&config.registry.class_name).context("registry.class")?;

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.scan.exclusions {
            builder.add(Glob::new(pattern).context(format!("scan.exclusions: {pattern}"))?);
        }
        let exclusions = builder.build().context("scan.exclusions")?;

        Ok(Self {
            registry_entry: registry.entry_path(),
            marker,
            registry,
            prefix: normalize_prefix(&config.scan.prefix),
            exclusions,
        })
    }

    #[must_use]
    pub const fn registry(&self) -> &QualifiedName {
        &self.registry
    }

    #[must_use]
    pub const fn marker(&self) -> &QualifiedName {
        &self.marker
    }

    /// Classifies one entry. The payload is only decoded when the name-based checks pass.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::Malformed`] when a decoded payload is not a class file.
    pub fn classify(&self, entry: &EntryName, payload: &[u8]) -> Result<Verdict, DiscoveryError> {
        if !is_unit_entry(entry) {
            return Ok(Verdict::Skipped(SkipReason::NotAUnit));
        }

        // located before the filters so a registry outside the prefix is still found
        if entry.as_str() == self.registry_entry {
            let header = decode(entry, payload)?;
            if header.name == self.registry.as_str() {
                return Ok(Verdict::Registry);
            }
            debug!(%entry, declared = %header.name, "Entry at the registry path declares another name");
        }

        if is_excluded(&self.exclusions, entry) {
            return Ok(Verdict::Skipped(SkipReason::Excluded));
        }
        if !within_prefix(&self.prefix, entry) {
            return Ok(Verdict::Skipped(SkipReason::OutsidePrefix));
        }

        let header = decode(entry, payload)?;
        if declares_marker(&header, &self.marker) {
            let name = QualifiedName::parse(&header.name).context(entry.to_string())?;
            return Ok(Verdict::Match(name));
        }
        Ok(Verdict::NoMatch)
    }

    /// Classifies every entry of `container` and records the results under `index`.
    ///
    /// # Errors
    /// Stops at the first read failure or malformed unit; the error context names the
    /// container and the entry.
    pub fn scan(
        &self,
        index: usize,
        container: &Container,
        aggregator: &Aggregator,
    ) -> Result<ScanStats, DiscoveryError> {
        let mut stats = ScanStats::default();

        let entries = container.scan(|entry, payload| {
            let verdict = self
                .classify(entry, payload)
                .with_context(|| format!("{}!{entry}", container.path().display()))?;
            if verdict.decoded() {
                stats.decoded += 1;
            }

            match verdict {
                Verdict::Match(name) => {
                    debug!(container = index, %entry, unit = %name.dotted(), "Marker implementation found");
                    stats.matches += 1;
                    aggregator.record(index, name);
                },
                Verdict::Registry => {
                    debug!(container = index, %entry, "Registry located");
                    aggregator.locate_registry(RegistryLocation { container: index, entry: entry.clone() });
                },
                Verdict::NoMatch => trace!(%entry, "No marker"),
                Verdict::Skipped(reason) => trace!(%entry, ?reason, "Skipped"),
            }
            Ok::<(), DiscoveryError>(())
        })?;

        stats.entries = entries;
        Ok(stats)
    }
}

fn decode(entry: &EntryName, payload: &[u8]) -> Result<ClassHeader, DiscoveryError> {
    ClassHeader::parse(payload).context(entry.to_string())
}
