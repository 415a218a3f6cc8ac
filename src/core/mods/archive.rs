use std::fs::File;
use std::path::Path;

use zip::ZipArchive;

use crate::core::error::{LauncherError, LauncherResult};

/// Extract every member of `zip_path` into `dest_dir`, overwriting files that
/// already exist. Progress is reported as `(done_entries, total_entries, name)`.
///
/// Entries whose path escapes `dest_dir` (Zip Slip) are skipped.
/// Returns the number of files written.
pub fn extract_zip<F>(zip_path: &Path, dest_dir: &Path, mut on_progress: F) -> LauncherResult<u64>
where
    F: FnMut(u64, u64, &str),
{
    let file = File::open(zip_path).map_err(|e| LauncherError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(file)?;

    std::fs::create_dir_all(dest_dir).map_err(|e| LauncherError::io(dest_dir, e))?;

    let total_entries = archive.len() as u64;
    let mut processed: u64 = 0;
    let mut written: u64 = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let entry_name = entry.name().to_string();
        processed = processed.saturating_add(1);

        let Some(safe_rel) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive path {:?}", entry_name);
            on_progress(processed, total_entries, &entry_name);
            continue;
        };
        let out_path = dest_dir.join(safe_rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
            on_progress(processed, total_entries, &entry_name);
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out_file = File::create(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out_file).map_err(|e| LauncherError::io(&out_path, e))?;

        written = written.saturating_add(1);
        on_progress(processed, total_entries, &entry_name);
    }

    Ok(written)
}
