use serde::{Deserialize, Serialize};

use crate::core::settings::MemoryBounds;

/// Supported mod loaders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Vanilla,
    Forge,
    Fabric,
    NeoForge,
    Quilt,
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderType::Vanilla => write!(f, "vanilla"),
            LoaderType::Forge => write!(f, "forge"),
            LoaderType::Fabric => write!(f, "fabric"),
            LoaderType::NeoForge => write!(f, "neoforge"),
            LoaderType::Quilt => write!(f, "quilt"),
        }
    }
}

/// Mod loader the bootstrap installs on top of the vanilla game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoaderSpec {
    #[serde(rename = "type")]
    pub kind: LoaderType,
    pub build: String,
    pub enable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

/// Immutable description of a preconfigured modded profile.
///
/// Game files live in `~/.<game_dir_name>` and mods in its `mods/` folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Location of the zipped mod bundle; `None` for instances without mods.
    pub mods_url: Option<String>,
    pub minecraft_version: String,
    pub loader: LoaderSpec,
    pub server: Option<ServerEndpoint>,
    /// Used only when the settings carry no heap bounds and no extra JVM
    /// arguments (the user cleared them, e.g. `{"memory":{"min":"","max":""}}`).
    pub jvm_args: Vec<String>,
    /// Per-field fallback for a blank `Settings.memory` bound.
    pub memory: MemoryBounds,
    pub game_dir_name: String,
}

impl InstanceConfig {
    /// Path to the instance's game directory under `home`.
    pub fn game_dir(&self, home: &std::path::Path) -> std::path::PathBuf {
        home.join(format!(".{}", self.game_dir_name))
    }
}
