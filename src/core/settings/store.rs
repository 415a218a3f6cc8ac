use std::path::PathBuf;

use tracing::{debug, warn};

use super::model::Settings;
use crate::core::error::LauncherResult;
use crate::core::persist;

/// Loads and saves [`Settings`]. Never propagates IO errors to callers.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Current settings. Missing fields take their defaults; a missing,
    /// unreadable or corrupt file yields [`Settings::default`].
    pub fn load(&self) -> Settings {
        match persist::read_json::<serde_json::Value>(&self.path) {
            Ok(Some(raw)) => match Self::from_value(raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Corrupt settings at {:?}, using defaults: {}", self.path, e);
                    Settings::default()
                }
            },
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("Cannot read settings at {:?}, using defaults: {}", self.path, e);
                Settings::default()
            }
        }
    }

    /// Merge `partial` over the freshly loaded settings and persist the result.
    ///
    /// Nested objects merge field by field (`{"memory": {"max": "6G"}}` keeps
    /// `memory.min`). Returns `false` when the patch does not fit the settings
    /// shape or the write fails; the file on disk is then left as it was.
    pub fn save(&self, partial: &serde_json::Value) -> bool {
        match self.try_save(partial) {
            Ok(_) => true,
            Err(e) => {
                warn!("Settings not saved: {}", e);
                false
            }
        }
    }

    /// Same as [`save`](Self::save) but hands back the merged settings.
    pub fn try_save(&self, partial: &serde_json::Value) -> LauncherResult<Settings> {
        let mut merged = serde_json::to_value(self.load())?;
        persist::merge_json(&mut merged, partial);
        let settings = Self::from_value(merged)?;

        persist::write_json_atomic(&self.path, &settings)?;
        debug!("Settings saved to {:?}", self.path);
        Ok(settings)
    }

    fn from_value(raw: serde_json::Value) -> LauncherResult<Settings> {
        // `null` at the top level behaves like an empty file.
        if raw.is_null() {
            return Ok(Settings::default());
        }
        Ok(serde_json::from_value(raw)?)
    }
}
