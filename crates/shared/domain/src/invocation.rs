//! The build-pipeline boundary: what the host hands to the stage.

use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the units of a container are bundled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// A zip/jar archive.
    Archive,
    /// A directory tree mirroring the namespace.
    Directory,
}

/// What the host is assembling. Only applications get the registry patched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildTarget {
    #[default]
    Application,
    Library,
}

/// One input container of the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInput {
    /// Host-assigned identity, unique within the invocation.
    pub name: String,
    pub path: PathBuf,
    pub kind: ContainerKind,
    #[serde(default)]
    pub scopes: Scope,
    /// Explicit output location; resolved from the output root when absent.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl ContainerInput {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: ContainerKind) -> Self {
        Self { name: name.into(), path: path.into(), kind, scopes: Scope::default(), output: None }
    }

    #[must_use]
    pub const fn with_scopes(mut self, scopes: Scope) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// A single run of the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInvocation {
    #[serde(default)]
    pub target: BuildTarget,
    pub output_root: PathBuf,
    pub inputs: Vec<ContainerInput>,
}
