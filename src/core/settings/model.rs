use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// JVM heap bounds in launcher notation (`"2G"`, `"512M"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryBounds {
    pub min: String,
    pub max: String,
}

impl Default for MemoryBounds {
    fn default() -> Self {
        Self {
            min: "2G".into(),
            max: "4G".into(),
        }
    }
}

impl MemoryBounds {
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

/// User preferences persisted as `settings.json`.
///
/// Every field has a fixed default so a partially written file still loads
/// into a complete structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub memory: MemoryBounds,
    /// `None` lets the bootstrap auto-detect a Java runtime.
    pub java_path: Option<PathBuf>,
    pub java_version: Option<String>,
    pub screen: ScreenConfig,
    pub jvm_args: Vec<String>,
    pub auto_connect: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            memory: MemoryBounds::default(),
            java_path: None,
            java_version: None,
            screen: ScreenConfig::default(),
            jvm_args: Vec::new(),
            auto_connect: true,
        }
    }
}
