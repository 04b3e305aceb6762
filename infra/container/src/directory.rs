//! Class directories laid out by package.

use crate::atomic::write_atomic;
use crate::entry::EntryName;
use crate::error::{ContainerError, ContainerErrorExt};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Directory {
    root: PathBuf,
}

impl Directory {
    pub(crate) const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn files(&self) -> impl Iterator<Item = Result<(EntryName, PathBuf), ContainerError>> + '_ {
        WalkDir::new(&self.root).sort_by_file_name().into_iter().filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let context = format!("Failed to walk {}", self.root.display());
                    return Some(Err(ContainerError::Io { source: err.into(), context: Some(context.into()) }));
                },
            };
            if !entry.file_type().is_file() {
                return None;
            }
            let path = entry.into_path();
            Some(EntryName::from_relative(&self.root, &path).map(|name| (name, path)))
        })
    }

    /// Visits every file in file-name order, depth first.
    pub(crate) fn scan<E, F>(&self, mut visit: F) -> Result<usize, E>
    where
        E: From<ContainerError>,
        F: FnMut(&EntryName, &[u8]) -> Result<(), E>,
    {
        let mut visited = 0;
        for file in self.files() {
            let (name, path) = file?;
            let payload =
                fs::read(&path).context(format!("Failed to read {}", path.display())).map_err(E::from)?;
            visit(&name, &payload)?;
            visited += 1;
        }
        Ok(visited)
    }

    pub(crate) fn read(&self, entry: &EntryName) -> Result<Vec<u8>, ContainerError> {
        let path = entry.to_path(&self.root);
        match fs::read(&path) {
            Ok(payload) => Ok(payload),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ContainerError::EntryNotFound {
                message: entry.to_string().into(),
                context: Some(self.root.display().to_string().into()),
            }),
            Err(err) => Err(ContainerError::Io {
                source: err,
                context: Some(format!("Failed to read {}", path.display()).into()),
            }),
        }
    }

    /// Copies every file below the root; an existing destination tree is removed first.
    pub(crate) fn forward(&self, destination: &Path) -> Result<(), ContainerError> {
        match fs::remove_dir_all(destination) {
            Ok(()) => {},
            Err(err) if err.kind() == ErrorKind::NotFound => {},
            Err(err) => {
                return Err(ContainerError::Io {
                    source: err,
                    context: Some(format!("Failed to clear {}", destination.display()).into()),
                });
            },
        }
        fs::create_dir_all(destination).context(format!("Failed to create {}", destination.display()))?;

        let mut copied = 0usize;
        for file in self.files() {
            let (name, source) = file?;
            let target = name.to_path(destination);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
            }
            fs::copy(&source, &target)
                .context(format!("Copy failed: {} -> {}", source.display(), target.display()))?;
            copied += 1;
        }

        debug!(from = %self.root.display(), to = %destination.display(), files = copied, "Directory forwarded");
        Ok(())
    }

    pub(crate) fn replace(&self, entry: &EntryName, payload: &[u8]) -> Result<(), ContainerError> {
        let target = entry.to_path(&self.root);
        if !target.is_file() {
            return Err(ContainerError::EntryNotFound {
                message: entry.to_string().into(),
                context: Some(self.root.display().to_string().into()),
            });
        }
        write_atomic(&target, |file| file.write_all(payload).context(format!("Failed to write {entry}")))
    }
}
