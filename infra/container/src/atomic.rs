//! Write-to-temp-then-rename file replacement.

use crate::error::{ContainerError, ContainerErrorExt};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Infix that marks temporary siblings; [`crate::purge_stale_temps`] looks for it.
pub const TEMP_MARKER: &str = ".weavetmp.";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Replaces `target` with whatever `write` puts into a fresh temporary sibling.
///
/// The temporary file is synced before it is renamed over `target`, so readers see
/// either the old file or the complete new one. When `write` fails the temporary file
/// is removed and `target` is left untouched.
pub(crate) fn write_atomic<F>(target: &Path, write: F) -> Result<(), ContainerError>
where
    F: FnOnce(&mut File) -> Result<(), ContainerError>,
{
    let parent = target.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent)
            .context(format!("Failed to create parent of {}", target.display()))?;
    }

    let (temp, mut file) = create_temp(target)?;
    let written = write(&mut file).and_then(|()| file.sync_all().context("Hardware sync failed"));
    drop(file);

    if let Err(err) = written.and_then(|()| swap(&temp, target)) {
        if let Err(cleanup) = fs::remove_file(&temp)
            && cleanup.kind() != ErrorKind::NotFound
        {
            warn!(path = %temp.display(), error = %cleanup, "Temp file removal failed");
        }
        return Err(err);
    }

    if let Some(parent) = parent {
        sync_dir(parent);
    }
    debug!(path = %target.display(), "File replaced atomically");
    Ok(())
}

fn create_temp(target: &Path) -> Result<(PathBuf, File), ContainerError> {
    loop {
        let temp = unique_tmp_path(target);
        match OpenOptions::new().create_new(true).write(true).read(true).open(&temp) {
            Ok(file) => return Ok((temp, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {},
            Err(err) => {
                return Err(ContainerError::Io {
                    source: err,
                    context: Some(format!("Temp creation failed: {}", temp.display()).into()),
                });
            },
        }
    }
}

fn swap(temp: &Path, target: &Path) -> Result<(), ContainerError> {
    match fs::rename(temp, target) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            fs::remove_file(target)
                .context(format!("Failed to replace existing file: {}", target.display()))?;
            fs::rename(temp, target).context(format!(
                "Atomic swap failed: {} -> {}",
                temp.display(),
                target.display()
            ))
        },
        Err(err) => Err(ContainerError::Io {
            source: err,
            context: Some(
                format!("Atomic swap failed: {} -> {}", temp.display(), target.display()).into(),
            ),
        }),
    }
}

fn sync_dir(path: &Path) {
    match File::open(path) {
        Ok(dir) => {
            if let Err(err) = dir.sync_all() {
                warn!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}

fn unique_tmp_path(target: &Path) -> PathBuf {
    let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("container");
    target.with_file_name(format!("{file_name}{TEMP_MARKER}{counter}"))
}
