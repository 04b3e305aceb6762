//! # Containers
//!
//! Uniform access to the two shapes compiled units arrive in: jar archives and
//! class directories.
//!
//! - **Deterministic scans**: archives in central-directory order, directories in
//!   file-name order.
//! - **Byte-exact forwarding**: outputs start as unmodified copies of their inputs.
//! - **Atomic replacement**: a single entry is swapped in through a synced temporary
//!   sibling (`<name>.weavetmp.<n>`), never by rewriting in place.
//! - **Self-healing**: [`purge_stale_temps`] removes temporaries left by crashed builds.
//!
//! # Example
//!
//! ```rust
//! use weave_container::{Container, ContainerError, EntryName};
//! use weave_domain::invocation::ContainerKind;
//!
//! # fn main() -> Result<(), ContainerError> {
//! # let tmp = tempfile::tempdir().unwrap();
//! # let input = tmp.path().join("classes");
//! # std::fs::create_dir_all(input.join("a")).unwrap();
//! # std::fs::write(input.join("a/B.class"), b"\xca\xfe\xba\xbe").unwrap();
//! let output = tmp.path().join("out");
//! let container = Container::open(ContainerKind::Directory, &input)?;
//!
//! let mut names = Vec::new();
//! container.scan(|name, _payload| {
//!     names.push(name.to_string());
//!     Ok::<(), ContainerError>(())
//! })?;
//! assert_eq!(names, ["a/B.class"]);
//!
//! container.forward(&output)?;
//! let forwarded = Container::open(ContainerKind::Directory, &output)?;
//! forwarded.replace(&EntryName::try_from("a/B.class")?, b"patched")?;
//! # Ok(())
//! # }
//! ```

mod archive;
mod atomic;
mod directory;
mod entry;
mod error;
mod maintenance;

pub use crate::archive::Archive;
pub use crate::atomic::TEMP_MARKER;
pub use crate::directory::Directory;
pub use crate::entry::EntryName;
pub use crate::error::{ContainerError, ContainerErrorExt};
pub use crate::maintenance::{STALE_AFTER, purge_stale_temps, purge_temps_older_than};

use std::path::Path;
use weave_domain::invocation::ContainerKind;

/// A handle to one input or output container.
#[derive(Debug, Clone)]
pub enum Container {
    Archive(Archive),
    Directory(Directory),
}

impl Container {
    /// Opens the container of `kind` at `path`.
    ///
    /// # Errors
    /// Returns [`ContainerError::Io`] when `path` does not exist or has the wrong
    /// file type for `kind`.
    pub fn open(kind: ContainerKind, path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).context(format!("Failed to open {}", path.display()))?;

        let mismatch = match kind {
            ContainerKind::Archive if meta.is_file() => None,
            ContainerKind::Directory if meta.is_dir() => None,
            ContainerKind::Archive => Some("Expected an archive file"),
            ContainerKind::Directory => Some("Expected a directory"),
        };
        if let Some(reason) = mismatch {
            return Err(ContainerError::Io {
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, reason),
                context: Some(path.display().to_string().into()),
            });
        }

        Ok(match kind {
            ContainerKind::Archive => Self::Archive(Archive::new(path.to_path_buf())),
            ContainerKind::Directory => Self::Directory(Directory::new(path.to_path_buf())),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> ContainerKind {
        match self {
            Self::Archive(_) => ContainerKind::Archive,
            Self::Directory(_) => ContainerKind::Directory,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Archive(archive) => archive.path(),
            Self::Directory(directory) => directory.path(),
        }
    }

    /// Calls `visit` with every file entry and its payload, in a deterministic order.
    /// Returns the number of entries visited.
    ///
    /// # Errors
    /// Stops at the first read failure or the first error returned by `visit`.
    pub fn scan<E, F>(&self, visit: F) -> Result<usize, E>
    where
        E: From<ContainerError>,
        F: FnMut(&EntryName, &[u8]) -> Result<(), E>,
    {
        match self {
            Self::Archive(archive) => archive.scan(visit),
            Self::Directory(directory) => directory.scan(visit),
        }
    }

    /// Reads a single entry.
    ///
    /// # Errors
    /// Returns [`ContainerError::EntryNotFound`] if there is no such entry.
    pub fn read(&self, entry: &EntryName) -> Result<Vec<u8>, ContainerError> {
        match self {
            Self::Archive(archive) => archive.read(entry),
            Self::Directory(directory) => directory.read(entry),
        }
    }

    /// Writes an unmodified copy of this container to `destination`, replacing
    /// whatever is there.
    ///
    /// # Errors
    /// Returns [`ContainerError::Io`] for read, write or rename failures, and
    /// [`ContainerError::InvalidEntry`] when `destination` is the container itself.
    pub fn forward(&self, destination: &Path) -> Result<(), ContainerError> {
        if same_location(self.path(), destination) {
            return Err(ContainerError::InvalidEntry {
                message: destination.display().to_string().into(),
                context: Some("Output location is the input itself".into()),
            });
        }
        match self {
            Self::Archive(archive) => archive.forward(destination),
            Self::Directory(directory) => directory.forward(destination),
        }
    }

    /// Atomically replaces the payload of an existing entry.
    ///
    /// # Errors
    /// Returns [`ContainerError::EntryNotFound`] if there is no such entry; the
    /// container is unchanged on any failure.
    pub fn replace(&self, entry: &EntryName, payload: &[u8]) -> Result<(), ContainerError> {
        match self {
            Self::Archive(archive) => archive.replace(entry, payload),
            Self::Directory(directory) => directory.replace(entry, payload),
        }
    }
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
