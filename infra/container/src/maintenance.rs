use crate::atomic::TEMP_MARKER;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Age after which a temporary file is assumed to be left over from a crashed build.
pub const STALE_AFTER: Duration = Duration::from_secs(300);

/// Removes orphaned temporary files older than [`STALE_AFTER`] below `root`.
///
/// Returns the number of files removed. Failures are logged, never returned.
pub async fn purge_stale_temps(root: &Path) -> usize {
    purge_temps_older_than(root, STALE_AFTER).await
}

/// [`purge_stale_temps`] with an explicit age threshold.
pub async fn purge_temps_older_than(root: &Path, threshold: Duration) -> usize {
    let root = root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now, threshold)).await {
        Ok((removed, failed)) => {
            if removed > 0 || failed > 0 {
                info!(removed, failed, "Cleaned up temporary files");
            }
            removed
        },
        Err(e) => {
            error!(error = %e, "Temp file cleanup task panicked");
            0
        },
    }
}

fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|entry| is_tmp(entry) && is_stale(entry, now, threshold))
        .for_each(|entry| match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Temp file removal failed");
                failed += 1;
            },
        });

    (removed, failed)
}

fn is_tmp(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.file_name().to_str().is_some_and(|name| name.contains(TEMP_MARKER))
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .map_or(true, |age| age >= threshold)
}
