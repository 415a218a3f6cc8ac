// ─── Mod acquisition ───
// Presence of at least one mod jar means the bundle is installed. Otherwise
// the bundle is downloaded, unpacked into a staging folder next to the mods
// folder and moved in only once the whole archive decoded.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::InstanceConfig;
use crate::core::launch::events::{EventSink, COLOR_DOWNLOAD, COLOR_SUCCESS, COLOR_WORKING};

use super::archive::extract_zip;

/// Extension of the files that count as installed mods.
pub const MOD_EXTENSION: &str = "jar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModsOutcome {
    AlreadyInstalled(usize),
    NoSource,
    Installed(usize),
}

/// Number of mod jars directly under `mods_dir` (0 if it does not exist).
pub fn count_mods(mods_dir: &Path) -> LauncherResult<usize> {
    let entries = match std::fs::read_dir(mods_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(LauncherError::io(mods_dir, e)),
    };

    let mut count = 0;
    for entry in entries {
        let path = entry.map_err(|e| LauncherError::io(mods_dir, e))?.path();
        let is_mod = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(MOD_EXTENSION));
        if is_mod {
            count += 1;
        }
    }
    Ok(count)
}

pub struct ModInstaller {
    downloader: Downloader,
    temp_dir: PathBuf,
}

impl ModInstaller {
    pub fn new(downloader: Downloader, temp_dir: PathBuf) -> Self {
        Self {
            downloader,
            temp_dir,
        }
    }

    /// Temporary archive path for `instance`.
    pub fn archive_path(&self, instance: &InstanceConfig) -> PathBuf {
        self.temp_dir.join(format!("{}-mods.zip", instance.id))
    }

    /// Make sure the instance's mod bundle is present in `mods_dir`.
    pub async fn ensure_mods(
        &self,
        instance: &InstanceConfig,
        mods_dir: &Path,
        events: &EventSink,
    ) -> LauncherResult<ModsOutcome> {
        let installed = count_mods(mods_dir).map_err(acquisition)?;
        if installed > 0 {
            debug!("{} mods already present in {:?}", installed, mods_dir);
            events.status(
                "Mods détectés",
                format!("{installed} mods déjà installés !"),
                40.0,
                COLOR_SUCCESS,
            );
            return Ok(ModsOutcome::AlreadyInstalled(installed));
        }

        let Some(url) = instance.mods_url.as_deref() else {
            info!("Instance {} has no mod bundle", instance.id);
            events.status(
                "Mods",
                "Aucun pack de mods pour cette instance",
                40.0,
                COLOR_SUCCESS,
            );
            return Ok(ModsOutcome::NoSource);
        };

        events.status(
            "Téléchargement",
            "Téléchargement des mods...",
            10.0,
            COLOR_DOWNLOAD,
        );
        self.install(instance, url, mods_dir, events)
            .await
            .map_err(acquisition)
    }

    async fn install(
        &self,
        instance: &InstanceConfig,
        url: &str,
        mods_dir: &Path,
        events: &EventSink,
    ) -> LauncherResult<ModsOutcome> {
        let zip_path = self.archive_path(instance);

        events.status(
            "Téléchargement",
            "Téléchargement du pack de mods...",
            15.0,
            COLOR_DOWNLOAD,
        );
        let mut last_percent = None;
        self.downloader
            .download_file(url, &zip_path, |progress| {
                let percent = progress.percent();
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    events.status(
                        "Téléchargement",
                        format!("Téléchargement... {percent}%"),
                        15.0 + f64::from(percent) * 0.35,
                        COLOR_DOWNLOAD,
                    );
                }
            })
            .await?;

        events.status("Extraction", "Extraction des mods...", 50.0, COLOR_WORKING);
        let staging = staging_dir(mods_dir);
        let extracted = extract_and_move(zip_path.clone(), staging.clone(), mods_dir.to_path_buf()).await;
        if let Err(e) = std::fs::remove_dir_all(&staging) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Cannot remove staging dir {:?}: {}", staging, e);
            }
        }
        if let Err(e) = extracted {
            let _ = std::fs::remove_file(&zip_path);
            return Err(e);
        }

        std::fs::remove_file(&zip_path).map_err(|e| LauncherError::io(&zip_path, e))?;

        let installed = count_mods(mods_dir)?;
        info!("Installed {} mods into {:?}", installed, mods_dir);
        events.status(
            "Installation terminée",
            format!("{installed} mods installés !"),
            60.0,
            COLOR_SUCCESS,
        );
        Ok(ModsOutcome::Installed(installed))
    }
}

fn acquisition(err: LauncherError) -> LauncherError {
    match err {
        LauncherError::Acquisition(_) => err,
        other => LauncherError::Acquisition(other.to_string()),
    }
}

fn staging_dir(mods_dir: &Path) -> PathBuf {
    let name = mods_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "mods".into());
    mods_dir.with_file_name(format!(".{name}-staging-{}", uuid::Uuid::new_v4().simple()))
}

async fn extract_and_move(zip_path: PathBuf, staging: PathBuf, mods_dir: PathBuf) -> LauncherResult<()> {
    tokio::task::spawn_blocking(move || {
        let written = extract_zip(&zip_path, &staging, |done, total, name| {
            debug!("[{}/{}] {}", done, total, name);
        })?;
        debug!("Extracted {} files into staging {:?}", written, staging);
        std::fs::create_dir_all(&mods_dir).map_err(|e| LauncherError::io(&mods_dir, e))?;
        move_into(&staging, &mods_dir)
    })
    .await
    .map_err(|e| LauncherError::Other(format!("extraction task failed: {e}")))?
}

/// Move every entry of `src` into `dst`, merging directories and replacing
/// files that already exist.
fn move_into(src: &Path, dst: &Path) -> LauncherResult<()> {
    for entry in std::fs::read_dir(src).map_err(|e| LauncherError::io(src, e))? {
        let entry = entry.map_err(|e| LauncherError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if from.is_dir() && to.is_dir() {
            move_into(&from, &to)?;
            continue;
        }
        if to.is_dir() {
            std::fs::remove_dir_all(&to).map_err(|e| LauncherError::io(&to, e))?;
        } else if to.exists() {
            std::fs::remove_file(&to).map_err(|e| LauncherError::io(&to, e))?;
        }
        std::fs::rename(&from, &to).map_err(|e| LauncherError::io(&to, e))?;
    }
    Ok(())
}
