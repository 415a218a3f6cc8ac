use std::collections::HashMap;

use tracing::debug;

use super::model::{InstanceConfig, LoaderSpec, LoaderType, ServerEndpoint};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::settings::MemoryBounds;

pub const DEFAULT_INSTANCE_ID: &str = "crazycity";

/// Static table of known instances with a default fallback.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    default_id: String,
    order: Vec<String>,
    instances: HashMap<String, InstanceConfig>,
}

impl InstanceRegistry {
    /// Build a registry from an explicit list. `default_id` must name one of
    /// the instances so that lookups can always fall back to it.
    pub fn new(default_id: &str, instances: Vec<InstanceConfig>) -> LauncherResult<Self> {
        let order: Vec<String> = instances.iter().map(|i| i.id.clone()).collect();
        let instances: HashMap<String, InstanceConfig> =
            instances.into_iter().map(|i| (i.id.clone(), i)).collect();

        if !instances.contains_key(default_id) {
            return Err(LauncherError::Configuration(format!(
                "default instance '{default_id}' is not defined"
            )));
        }

        Ok(Self {
            default_id: default_id.to_string(),
            order,
            instances,
        })
    }

    /// Instances shipped with the launcher.
    pub fn builtin() -> Self {
        let crazycity = InstanceConfig {
            id: "crazycity".into(),
            name: "CrazyCity".into(),
            description: "Serveur RP moddé CrazyCity (NeoForge 1.21.1)".into(),
            mods_url: Some("http://192.168.1.115:8080/mods.zip".into()),
            minecraft_version: "1.21.1".into(),
            loader: LoaderSpec {
                kind: LoaderType::NeoForge,
                build: "21.1.211".into(),
                enable: true,
            },
            server: Some(ServerEndpoint {
                host: "192.168.1.115".into(),
                port: 25565,
            }),
            jvm_args: vec!["-Xmx4G".into(), "-Xms2G".into()],
            memory: MemoryBounds::new("2G", "4G"),
            game_dir_name: "crazycity".into(),
        };

        let donut = InstanceConfig {
            id: "donut".into(),
            name: "Donut".into(),
            description: "Survie moddée Donut (NeoForge 1.21.1)".into(),
            mods_url: Some("http://192.168.1.115:8080/donut-mods.zip".into()),
            minecraft_version: "1.21.1".into(),
            loader: LoaderSpec {
                kind: LoaderType::NeoForge,
                build: "21.1.211".into(),
                enable: true,
            },
            server: Some(ServerEndpoint {
                host: "192.168.1.115".into(),
                port: 25566,
            }),
            jvm_args: vec!["-Xmx6G".into(), "-Xms2G".into()],
            memory: MemoryBounds::new("2G", "6G"),
            game_dir_name: "donut".into(),
        };

        Self {
            default_id: DEFAULT_INSTANCE_ID.into(),
            order: vec![crazycity.id.clone(), donut.id.clone()],
            instances: [crazycity, donut]
                .into_iter()
                .map(|i| (i.id.clone(), i))
                .collect(),
        }
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Look up `id`, falling back to the default instance when `id` is absent
    /// or unknown. Never fails.
    pub fn get(&self, id: Option<&str>) -> &InstanceConfig {
        if let Some(instance) = id.and_then(|id| self.instances.get(id)) {
            return instance;
        }
        if let Some(id) = id {
            debug!("Unknown instance '{}', using '{}'", id, self.default_id);
        }
        &self.instances[&self.default_id]
    }

    /// Strict lookup without fallback.
    pub fn find(&self, id: &str) -> Option<&InstanceConfig> {
        self.instances.get(id)
    }

    /// All instances in declaration order.
    pub fn list(&self) -> Vec<&InstanceConfig> {
        self.order
            .iter()
            .filter_map(|id| self.instances.get(id))
            .collect()
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
