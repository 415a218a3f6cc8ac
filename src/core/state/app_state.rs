use std::sync::Arc;

use tracing::info;

use super::paths::LauncherPaths;
use crate::core::auth::{
    AccountStore, AuthCoordinator, DeviceCodeNotifier, IdentityProviderFactory, ProviderConfig,
};
use crate::core::downloader::Downloader;
use crate::core::error::LauncherResult;
use crate::core::instance::InstanceRegistry;
use crate::core::launch::{GameBootstrap, Launcher};
use crate::core::mods::ModInstaller;
use crate::core::settings::SettingsStore;

/// Everything a front end needs, wired once per process.
pub struct AppState {
    pub paths: LauncherPaths,
    pub launcher: Arc<Launcher>,
}

impl AppState {
    pub fn new(
        paths: LauncherPaths,
        registry: InstanceRegistry,
        factory: Arc<dyn IdentityProviderFactory>,
        on_device_code: DeviceCodeNotifier,
        bootstrap: Arc<dyn GameBootstrap>,
    ) -> LauncherResult<Self> {
        paths.ensure_data_dir()?;
        info!("Launcher data directory: {:?}", paths.data_dir);

        let auth = Arc::new(AuthCoordinator::new(
            ProviderConfig::new(paths.token_cache_dir(), on_device_code),
            factory,
            AccountStore::new(paths.account_file()),
        ));
        let mods = ModInstaller::new(Downloader::new()?, paths.temp_dir.clone());

        let launcher = Launcher::new(
            registry,
            SettingsStore::new(paths.settings_file()),
            auth,
            mods,
            bootstrap,
            paths.home_dir.clone(),
        );

        Ok(Self {
            paths,
            launcher: Arc::new(launcher),
        })
    }

    pub fn auth(&self) -> &Arc<AuthCoordinator> {
        self.launcher.auth()
    }

    pub fn settings(&self) -> &SettingsStore {
        self.launcher.settings()
    }

    pub fn registry(&self) -> &InstanceRegistry {
        self.launcher.registry()
    }
}
