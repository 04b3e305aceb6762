//! Qualified type names in their internal, `/`-separated binary form.

use crate::constants::UNIT_SUFFIX;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rejection reason for a malformed qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameError {
    pub name: String,
    pub reason: &'static str,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid qualified name '{}': {}", self.name, self.reason)
    }
}

impl std::error::Error for NameError {}

/// A fully-qualified type name such as `top/clarkding/router/ARouter`.
///
/// Dotted input (`top.clarkding.router.ARouter`) is accepted and normalized.
/// Nested classes keep their `$` separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName(String);

impl QualifiedName {
    /// Parses and normalizes a qualified name.
    ///
    /// # Errors
    /// Returns [`NameError`] for empty names, empty segments, or characters that
    /// cannot appear in a class name (`;`, `[`).
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        let normalized = raw.trim().replace('.', "/");
        let reject = |reason| NameError { name: raw.to_owned(), reason };

        if normalized.is_empty() {
            return Err(reject("name is empty"));
        }
        if normalized.split('/').any(str::is_empty) {
            return Err(reject("name has an empty segment"));
        }
        if normalized.contains([';', '[']) {
            return Err(reject("descriptor characters are not allowed"));
        }

        Ok(Self(normalized))
    }

    /// Derives the declared name from an entry path like `a/b/C.class`.
    #[must_use]
    pub fn from_entry_path(path: &str) -> Option<Self> {
        path.strip_suffix(UNIT_SUFFIX).and_then(|stem| Self::parse(stem).ok())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, e.g. `R$string` for `a/b/R$string`.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Entry path of the compiled unit inside a container.
    #[must_use]
    pub fn entry_path(&self) -> String {
        format!("{}{UNIT_SUFFIX}", self.0)
    }

    /// Dotted source-level spelling, for log output.
    #[must_use]
    pub fn dotted(&self) -> String {
        self.0.replace('/', ".")
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, NameError> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for QualifiedName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, NameError> {
        Self::parse(value)
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.0
    }
}

impl AsRef<str> for QualifiedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a namespace prefix (`top.clarkding.router/` -> `top/clarkding/router`).
#[must_use]
pub fn normalize_prefix(raw: &str) -> String {
    raw.trim().replace('.', "/").trim_matches('/').to_owned()
}
