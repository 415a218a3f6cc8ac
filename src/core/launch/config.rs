// ─── Launch configuration ───
// Options object handed to the game bootstrap, derived fresh for every launch.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::auth::Authenticator;
use crate::core::instance::{InstanceConfig, LoaderSpec};
use crate::core::settings::{MemoryBounds, ScreenConfig, Settings};

/// Used when neither the settings nor the instance provide JVM arguments.
pub const DEFAULT_JVM_ARGS: [&str; 2] = ["-Xmx4G", "-Xms2G"];

/// Files the bootstrap must never overwrite in the game directory.
pub const IGNORED_FILES: [&str; 2] = ["options.txt", "servers.dat"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JavaHints {
    /// `None` lets the bootstrap pick or download a runtime.
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LaunchConfiguration {
    /// Game directory.
    pub path: PathBuf,
    pub mods_dir: PathBuf,
    pub version: String,
    pub loader: LoaderSpec,
    pub authenticator: Authenticator,
    pub verify: bool,
    pub ignored: Vec<String>,
    #[serde(rename = "JVM_ARGS")]
    pub jvm_args: Vec<String>,
    #[serde(rename = "GAME_ARGS")]
    pub game_args: Vec<String>,
    pub java: JavaHints,
    pub screen: ScreenConfig,
    pub memory: MemoryBounds,
}

impl LaunchConfiguration {
    pub fn assemble(
        instance: &InstanceConfig,
        settings: &Settings,
        authenticator: Authenticator,
        game_dir: &Path,
        mods_dir: &Path,
    ) -> Self {
        Self {
            path: game_dir.to_path_buf(),
            mods_dir: mods_dir.to_path_buf(),
            version: instance.minecraft_version.clone(),
            loader: instance.loader.clone(),
            authenticator,
            verify: false,
            ignored: IGNORED_FILES.iter().map(|f| f.to_string()).collect(),
            jvm_args: jvm_args(instance, settings),
            game_args: game_args(instance, settings),
            java: JavaHints {
                path: settings.java_path.clone(),
                version: settings.java_version.clone(),
                kind: "jre".into(),
            },
            screen: settings.screen.clone(),
            memory: memory_bounds(instance, settings),
        }
    }
}

/// Heap flags from the settings followed by the user's extra arguments.
/// Falls back to the instance defaults, then to [`DEFAULT_JVM_ARGS`].
pub fn jvm_args(instance: &InstanceConfig, settings: &Settings) -> Vec<String> {
    let mut args = Vec::new();

    let max = settings.memory.max.trim();
    if !max.is_empty() {
        args.push(format!("-Xmx{max}"));
    }
    let min = settings.memory.min.trim();
    if !min.is_empty() {
        args.push(format!("-Xms{min}"));
    }
    args.extend(
        settings
            .jvm_args
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string),
    );

    if !args.is_empty() {
        return args;
    }
    if !instance.jvm_args.is_empty() {
        return instance.jvm_args.clone();
    }
    DEFAULT_JVM_ARGS.iter().map(|a| a.to_string()).collect()
}

/// Server connection arguments, only when the instance has a server and the
/// user kept auto-connect on.
pub fn game_args(instance: &InstanceConfig, settings: &Settings) -> Vec<String> {
    match &instance.server {
        Some(server) if settings.auto_connect => vec![
            "--server".into(),
            server.host.clone(),
            "--port".into(),
            server.port.to_string(),
        ],
        _ => Vec::new(),
    }
}

fn memory_bounds(instance: &InstanceConfig, settings: &Settings) -> MemoryBounds {
    let pick = |value: &str, fallback: &str| {
        if value.trim().is_empty() {
            fallback.to_string()
        } else {
            value.trim().to_string()
        }
    };
    MemoryBounds {
        min: pick(&settings.memory.min, &instance.memory.min),
        max: pick(&settings.memory.max, &instance.memory.max),
    }
}
