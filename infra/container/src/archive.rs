//! Jar and zip archives.

use crate::atomic::write_atomic;
use crate::entry::EntryName;
use crate::error::{ContainerError, ContainerErrorExt};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;

#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    pub(crate) const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<ZipArchive<BufReader<File>>, ContainerError> {
        let file = File::open(&self.path)
            .context(format!("Failed to open archive {}", self.path.display()))?;
        ZipArchive::new(BufReader::new(file))
            .context(format!("Failed to read central directory of {}", self.path.display()))
    }

    /// Visits every file entry in central-directory order.
    pub(crate) fn scan<E, F>(&self, mut visit: F) -> Result<usize, E>
    where
        E: From<ContainerError>,
        F: FnMut(&EntryName, &[u8]) -> Result<(), E>,
    {
        let mut archive = self.open()?;
        let mut visited = 0;
        let mut payload = Vec::new();

        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .context(format!("Failed to read entry #{index} of {}", self.path.display()))
                .map_err(E::from)?;
            if file.is_dir() {
                continue;
            }
            let name = EntryName::try_from(file.name())
                .context(self.path.display().to_string())
                .map_err(E::from)?;

            payload.clear();
            file.read_to_end(&mut payload)
                .context(format!("Failed to inflate {name} in {}", self.path.display()))
                .map_err(E::from)?;
            drop(file);

            visit(&name, &payload)?;
            visited += 1;
        }
        Ok(visited)
    }

    pub(crate) fn read(&self, entry: &EntryName) -> Result<Vec<u8>, ContainerError> {
        let mut archive = self.open()?;
        let mut file = match archive.by_name(entry.as_str()) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(ContainerError::EntryNotFound {
                    message: entry.to_string().into(),
                    context: Some(self.path.display().to_string().into()),
                });
            },
            Err(err) => {
                return Err(ContainerError::Archive {
                    source: err,
                    context: Some(format!("Failed to read {entry} in {}", self.path.display()).into()),
                });
            },
        };
        let mut payload = Vec::new();
        file.read_to_end(&mut payload)
            .context(format!("Failed to inflate {entry} in {}", self.path.display()))?;
        Ok(payload)
    }

    /// Copies the archive file unchanged.
    pub(crate) fn forward(&self, destination: &Path) -> Result<(), ContainerError> {
        let mut source = File::open(&self.path)
            .context(format!("Failed to open archive {}", self.path.display()))?;
        write_atomic(destination, |file| {
            io::copy(&mut source, file)
                .map(|_| ())
                .context(format!("Copy failed: {} -> {}", self.path.display(), destination.display()))
        })?;
        debug!(from = %self.path.display(), to = %destination.display(), "Archive forwarded");
        Ok(())
    }

    /// Rewrites the archive with `entry` holding `payload`.
    ///
    /// Other entries are raw-copied with their compressed data and headers. The
    /// replaced entry keeps its compression method, timestamp and unix mode.
    pub(crate) fn replace(&self, entry: &EntryName, payload: &[u8]) -> Result<(), ContainerError> {
        // read up front so the file is closed before it is swapped
        let bytes = fs::read(&self.path).context(format!("Failed to read {}", self.path.display()))?;
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .context(format!("Failed to read central directory of {}", self.path.display()))?;

        write_atomic(&self.path, |file| {
            let mut writer = ZipWriter::new(BufWriter::new(file));
            let mut found = false;

            for index in 0..archive.len() {
                let source = archive
                    .by_index_raw(index)
                    .context(format!("Failed to read entry #{index} of {}", self.path.display()))?;

                if source.name() != entry.as_str() {
                    writer
                        .raw_copy_file(source)
                        .context(format!("Failed to copy entry #{index} of {}", self.path.display()))?;
                    continue;
                }

                let mut options = SimpleFileOptions::default()
                    .compression_method(source.compression())
                    .last_modified_time(source.last_modified().unwrap_or_default());
                if let Some(mode) = source.unix_mode() {
                    options = options.unix_permissions(mode);
                }
                drop(source);

                writer.start_file(entry.as_str(), options).context(format!("Failed to start {entry}"))?;
                writer.write_all(payload).context(format!("Failed to write {entry}"))?;
                found = true;
            }

            if !found {
                return Err(ContainerError::EntryNotFound {
                    message: entry.to_string().into(),
                    context: Some(self.path.display().to_string().into()),
                });
            }

            writer
                .finish()
                .context(format!("Failed to finish {}", self.path.display()))?
                .flush()
                .context("Flush failed")
        })?;

        debug!(archive = %self.path.display(), %entry, "Archive entry replaced");
        Ok(())
    }
}
