use crate::error::ContainerError;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A `/`-separated relative path naming one file inside a container.
///
/// Absolute paths, backslashes, and `.`/`..` or empty segments are rejected, so an
/// entry name can always be joined onto a directory root without escaping it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryName(String);

impl EntryName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Physical location of this entry below `root`.
    #[must_use]
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment))
    }

    /// Entry name of a file found at `path` below `root`.
    pub(crate) fn from_relative(root: &Path, path: &Path) -> Result<Self, ContainerError> {
        let relative = path.strip_prefix(root).map_err(|_| ContainerError::InvalidEntry {
            message: path.display().to_string().into(),
            context: Some(format!("Not below {}", root.display()).into()),
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    segments.push(segment.to_str().ok_or_else(|| ContainerError::InvalidEntry {
                        message: path.display().to_string().into(),
                        context: Some("Entry name is not valid UTF-8".into()),
                    })?);
                },
                _ => return Err(illegal(&relative.display().to_string(), "Unexpected path component")),
            }
        }
        Self::try_from(segments.join("/"))
    }
}

fn illegal(name: &str, reason: &'static str) -> ContainerError {
    ContainerError::InvalidEntry { message: name.to_owned().into(), context: Some(reason.into()) }
}

impl TryFrom<String> for EntryName {
    type Error = ContainerError;

    fn try_from(value: String) -> Result<Self, ContainerError> {
        if value.is_empty() {
            return Err(illegal("EMPTY", "Entry name cannot be empty"));
        }
        if value.starts_with('/') {
            return Err(illegal(&value, "Entry name must be relative"));
        }
        if value.contains(['\\', '\0']) {
            return Err(illegal(&value, "Entry name contains illegal characters"));
        }
        if value.split('/').any(|segment| matches!(segment, "" | "." | "..")) {
            return Err(illegal(&value, "Entry name contains an empty or relative segment"));
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for EntryName {
    type Error = ContainerError;

    fn try_from(value: &str) -> Result<Self, ContainerError> {
        Self::try_from(value.to_owned())
    }
}

impl AsRef<str> for EntryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
