use serde::Serialize;
use std::path::PathBuf;
use weave_domain::invocation::BuildTarget;
use weave_domain::names::QualifiedName;

/// Summary of a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub target: BuildTarget,
    /// Containers forwarded to their outputs.
    pub containers: usize,
    /// Containers whose entries were classified.
    pub scanned: usize,
    /// Entries visited across scanned containers.
    pub entries: usize,
    /// Units whose headers were decoded.
    pub decoded: usize,
    pub discovered: Vec<QualifiedName>,
    pub registry: Option<RegistryReport>,
    /// Output location of every input, in input order.
    pub outputs: Vec<PathBuf>,
}

impl BuildReport {
    /// Whether the registry class was rewritten.
    #[must_use]
    pub fn patched(&self) -> bool {
        self.registry.as_ref().is_some_and(|registry| registry.patched)
    }
}

/// What happened to the registry class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryReport {
    pub container: usize,
    pub entry: String,
    pub output: PathBuf,
    pub patched: bool,
    pub routines: usize,
    pub sites: usize,
}
