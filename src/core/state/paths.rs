use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::InstanceConfig;

const APP_DIR_NAME: &str = "crazycity-launcher";

/// Overrides the launcher data directory.
pub const DATA_DIR_ENV: &str = "CRAZYCITY_LAUNCHER_DATA_DIR";

/// Filesystem roots the launcher works under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    /// Settings, stored account and token cache.
    pub data_dir: PathBuf,
    /// Parent of the per-instance game directories.
    pub home_dir: PathBuf,
    /// Scratch space for downloaded archives.
    pub temp_dir: PathBuf,
}

impl LauncherPaths {
    pub fn new(data_dir: PathBuf, home_dir: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            data_dir,
            home_dir,
            temp_dir,
        }
    }

    /// Platform defaults, honouring [`DATA_DIR_ENV`].
    pub fn from_env() -> LauncherResult<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            LauncherError::Configuration("dossier personnel introuvable".into())
        })?;

        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .unwrap_or_else(|| home_dir.clone())
                .join(APP_DIR_NAME),
        };

        Ok(Self::new(data_dir, home_dir, std::env::temp_dir()))
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn account_file(&self) -> PathBuf {
        self.data_dir.join("accounts").join("microsoft.json")
    }

    pub fn token_cache_dir(&self) -> PathBuf {
        self.data_dir.join("msal-cache")
    }

    pub fn game_dir(&self, instance: &InstanceConfig) -> PathBuf {
        instance.game_dir(&self.home_dir)
    }

    pub fn mods_dir(&self, instance: &InstanceConfig) -> PathBuf {
        crate::core::launch::mods_dir(&self.game_dir(instance))
    }

    pub fn ensure_data_dir(&self) -> LauncherResult<&Path> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| LauncherError::io(&self.data_dir, e))?;
        Ok(&self.data_dir)
    }
}
