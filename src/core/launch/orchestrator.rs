// ─── Launch orchestrator ───
// instance → authenticator → directories → mods → settings → configuration →
// bootstrap, relaying everything as one normalized event stream.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::bootstrap::{BootstrapEvent, GameBootstrap};
use super::config::LaunchConfiguration;
use super::events::{
    EventSink, LaunchEvent, COLOR_CLOSED, COLOR_ERROR, COLOR_LAUNCH, COLOR_WORKING,
};
use crate::core::auth::{AuthCoordinator, AuthKind, Authenticator};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{InstanceConfig, InstanceRegistry};
use crate::core::mods::ModInstaller;
use crate::core::settings::SettingsStore;

/// Overall progress when control passes to the bootstrap.
pub const HANDOFF_PROGRESS: f64 = 60.0;
/// Upper end of the band the bootstrap's own progress is mapped into.
pub const BOOTSTRAP_PROGRESS_END: f64 = 95.0;

const BOOTSTRAP_CHANNEL_CAPACITY: usize = 256;

/// Which identity a launch runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSelector {
    Offline { username: String },
    Microsoft,
}

impl AccountSelector {
    pub fn offline(username: impl Into<String>) -> Self {
        AccountSelector::Offline {
            username: username.into(),
        }
    }
}

pub struct Launcher {
    registry: InstanceRegistry,
    settings: SettingsStore,
    auth: Arc<AuthCoordinator>,
    mods: ModInstaller,
    bootstrap: Arc<dyn GameBootstrap>,
    home_dir: PathBuf,
    launching: Mutex<HashSet<String>>,
}

/// Marks an instance as launching until dropped.
struct LaunchSlot<'a> {
    launching: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> LaunchSlot<'a> {
    fn acquire(launching: &'a Mutex<HashSet<String>>, id: &str) -> Option<Self> {
        let mut set = launching.lock().unwrap_or_else(|p| p.into_inner());
        if !set.insert(id.to_string()) {
            return None;
        }
        Some(Self {
            launching,
            id: id.to_string(),
        })
    }
}

impl Drop for LaunchSlot<'_> {
    fn drop(&mut self) {
        self.launching
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.id);
    }
}

impl Launcher {
    pub fn new(
        registry: InstanceRegistry,
        settings: SettingsStore,
        auth: Arc<AuthCoordinator>,
        mods: ModInstaller,
        bootstrap: Arc<dyn GameBootstrap>,
        home_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            settings,
            auth,
            mods,
            bootstrap,
            home_dir,
            launching: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn auth(&self) -> &Arc<AuthCoordinator> {
        &self.auth
    }

    pub fn is_launching(&self, instance_id: &str) -> bool {
        self.launching
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(instance_id)
    }

    /// Launch `instance_id` (default instance when absent or unknown).
    ///
    /// The outcome is reported on `events`. Failures before the bootstrap
    /// takes over are reported there too and additionally returned as `Err`.
    /// A failure reported by the bootstrap itself only shows up as events.
    pub async fn launch(
        &self,
        instance_id: Option<&str>,
        selector: AccountSelector,
        events: &EventSink,
    ) -> LauncherResult<()> {
        let instance = self.registry.get(instance_id);

        let Some(_slot) = LaunchSlot::acquire(&self.launching, &instance.id) else {
            let err = LauncherError::LaunchInProgress(instance.id.clone());
            warn!("{}", err);
            report_failure(events, &err.to_string());
            return Err(err);
        };

        info!("Launching instance {} ({:?})", instance.id, selector);
        let config = match self.prepare(instance, selector, events).await {
            Ok(config) => config,
            Err(e) => {
                error!("Launch of {} aborted: {}", instance.id, e);
                report_failure(events, &e.to_string());
                return Err(e);
            }
        };

        let auth_kind = config.authenticator.kind();
        let (tx, rx) = mpsc::channel(BOOTSTRAP_CHANNEL_CAPACITY);
        tokio::join!(
            self.bootstrap.launch(config, tx),
            relay(rx, events, auth_kind, &instance.id)
        );
        Ok(())
    }

    async fn prepare(
        &self,
        instance: &InstanceConfig,
        selector: AccountSelector,
        events: &EventSink,
    ) -> LauncherResult<LaunchConfiguration> {
        let authenticator = self.resolve_authenticator(selector).await?;

        let game_dir = instance.game_dir(&self.home_dir);
        let mods_dir = mods_dir(&game_dir);
        debug!("Game directory: {:?}", game_dir);
        debug!("Mods directory: {:?}", mods_dir);
        std::fs::create_dir_all(&mods_dir).map_err(|e| LauncherError::io(&mods_dir, e))?;

        let outcome = self.mods.ensure_mods(instance, &mods_dir, events).await?;
        debug!("Mods for {}: {:?}", instance.id, outcome);

        let settings = self.settings.load();
        events.status(
            "Lancement",
            "Initialisation de Minecraft...",
            HANDOFF_PROGRESS,
            COLOR_LAUNCH,
        );

        Ok(LaunchConfiguration::assemble(
            instance,
            &settings,
            authenticator,
            &game_dir,
            &mods_dir,
        ))
    }

    async fn resolve_authenticator(&self, selector: AccountSelector) -> LauncherResult<Authenticator> {
        match selector {
            AccountSelector::Offline { username } => Ok(Authenticator::offline(&username)),
            AccountSelector::Microsoft => {
                let account = self.auth.refresh().await.ok_or(LauncherError::NoAccount)?;
                Ok(Authenticator::from_account(&account))
            }
        }
    }
}

/// Mods folder inside a game directory.
pub fn mods_dir(game_dir: &Path) -> PathBuf {
    game_dir.join("mods")
}

/// Bootstrap progress `current/total` expressed in the 60–95 overall band.
pub fn remap_progress(current: u64, total: u64) -> f64 {
    let percent = if total == 0 {
        0.0
    } else {
        (current as f64 / total as f64 * 100.0).round().min(100.0)
    };
    HANDOFF_PROGRESS + percent * (BOOTSTRAP_PROGRESS_END - HANDOFF_PROGRESS) / 100.0
}

fn report_failure(events: &EventSink, message: &str) {
    events.status("Erreur", message, 0.0, COLOR_ERROR);
    events.emit(LaunchEvent::LaunchError {
        error: message.to_string(),
    });
}

/// Forward bootstrap events until the first close or error.
async fn relay(
    mut rx: mpsc::Receiver<BootstrapEvent>,
    events: &EventSink,
    auth_kind: AuthKind,
    instance_id: &str,
) {
    let mut progress = HANDOFF_PROGRESS;

    while let Some(event) = rx.recv().await {
        match event {
            BootstrapEvent::Progress {
                current,
                total,
                label,
            } => {
                progress = progress.max(remap_progress(current, total));
                events.status("Téléchargement Minecraft", label, progress, COLOR_WORKING);
            }
            BootstrapEvent::Data(raw) => {
                let line = raw.trim();
                if !line.is_empty() {
                    info!("[minecraft] {}", line);
                    events.log(line);
                }
            }
            BootstrapEvent::Close(code) => {
                info!("Instance {} exited with code {}", instance_id, code);
                events.status(
                    "Jeu fermé",
                    format!("Minecraft s'est arrêté avec le code {code}"),
                    100.0,
                    COLOR_CLOSED,
                );
                events.emit(LaunchEvent::GameClosed { code });
                events.emit(LaunchEvent::LaunchComplete {
                    auth_kind,
                    instance_id: instance_id.to_string(),
                });
                return;
            }
            BootstrapEvent::Error(message) => {
                let err = LauncherError::LaunchDelegation(message);
                error!("Bootstrap failed for {}: {}", instance_id, err);
                report_failure(events, &err.to_string());
                return;
            }
        }
    }

    let err = LauncherError::LaunchDelegation(
        "Le lanceur du jeu s'est arrêté sans signaler de fin".into(),
    );
    error!("{}", err);
    report_failure(events, &err.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::coordinator::tests::{coordinator, token_for, MockProvider};
    use crate::core::auth::ProviderError;
    use crate::core::downloader::Downloader;
    use crate::core::launch::events::StatusUpdate;
    use crate::core::test_support::{zip_bytes, Route, TempDir, TestServer};
    use async_trait::async_trait;
    use tokio::sync::{mpsc::UnboundedReceiver, Notify};

    /// Records the configuration it receives and replays scripted events.
    struct ScriptedBootstrap {
        script: Vec<BootstrapEvent>,
        received: Mutex<Vec<LaunchConfiguration>>,
        entered: Arc<Notify>,
        release: Option<Arc<Notify>>,
    }

    impl ScriptedBootstrap {
        fn new(script: Vec<BootstrapEvent>) -> Arc<Self> {
            Arc::new(Self {
                script,
                received: Mutex::new(Vec::new()),
                entered: Arc::new(Notify::new()),
                release: None,
            })
        }

        fn held(script: Vec<BootstrapEvent>, release: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                script,
                received: Mutex::new(Vec::new()),
                entered: Arc::new(Notify::new()),
                release: Some(release),
            })
        }

        fn received(&self) -> Vec<LaunchConfiguration> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GameBootstrap for ScriptedBootstrap {
        async fn launch(&self, config: LaunchConfiguration, events: mpsc::Sender<BootstrapEvent>) {
            self.received.lock().unwrap().push(config);
            self.entered.notify_one();
            if let Some(release) = &self.release {
                release.notified().await;
            }
            for event in self.script.clone() {
                let _ = events.send(event).await;
            }
        }
    }

    struct Fixture {
        dir: TempDir,
        launcher: Launcher,
    }

    impl Fixture {
        fn game_dir(&self) -> PathBuf {
            self.dir.path().join("home").join(".crazycity")
        }
    }

    fn fixture(
        label: &str,
        mods_url: Option<String>,
        provider: Arc<MockProvider>,
        bootstrap: Arc<dyn GameBootstrap>,
    ) -> Fixture {
        let dir = TempDir::new(label);
        let mut instance = InstanceRegistry::builtin().get(Some("crazycity")).clone();
        instance.mods_url = mods_url;
        let registry = InstanceRegistry::new("crazycity", vec![instance]).unwrap();

        let temp = dir.path().join("tmp");
        std::fs::create_dir_all(&temp).unwrap();
        let (auth, _factory) = coordinator(&dir, provider);
        let launcher = Launcher::new(
            registry,
            SettingsStore::new(dir.path().join("settings.json")),
            auth,
            ModInstaller::new(Downloader::new().unwrap(), temp),
            bootstrap,
            dir.path().join("home"),
        );
        Fixture { dir, launcher }
    }

    fn drain(rx: &mut UnboundedReceiver<LaunchEvent>) -> Vec<LaunchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn statuses(events: &[LaunchEvent]) -> Vec<StatusUpdate> {
        events
            .iter()
            .filter_map(|e| match e {
                LaunchEvent::Status(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn closing_script() -> Vec<BootstrapEvent> {
        vec![
            BootstrapEvent::Progress {
                current: 50,
                total: 100,
                label: "assets".into(),
            },
            BootstrapEvent::Progress {
                current: 10,
                total: 100,
                label: "libraries".into(),
            },
            BootstrapEvent::Data("  [Render thread/INFO] Setting user: Alice \n".into()),
            BootstrapEvent::Data("   ".into()),
            BootstrapEvent::Close(0),
        ]
    }

    #[test]
    fn bootstrap_progress_maps_into_launch_band() {
        assert_eq!(remap_progress(0, 100), 60.0);
        assert_eq!(remap_progress(100, 100), 95.0);
        assert_eq!(remap_progress(1, 2), 77.5);
        assert_eq!(remap_progress(5, 0), 60.0);
        assert_eq!(remap_progress(300, 100), 95.0);
    }

    #[tokio::test]
    async fn installs_mods_then_hands_off_at_sixty() {
        let server = TestServer::start(vec![(
            "/mods.zip",
            Route::ok(zip_bytes(&[("alpha.jar", b"a"), ("beta.jar", b"b")])),
        )])
        .await;
        let bootstrap = ScriptedBootstrap::new(closing_script());
        let fx = fixture(
            "launch-install",
            Some(server.url("/mods.zip")),
            MockProvider::new(vec![]),
            bootstrap.clone(),
        );
        let (sink, mut rx) = EventSink::channel();

        fx.launcher
            .launch(Some("crazycity"), AccountSelector::offline("Alice"), &sink)
            .await
            .unwrap();

        let mut mods: Vec<_> = std::fs::read_dir(mods_dir(&fx.game_dir()))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        mods.sort();
        assert_eq!(mods, ["alpha.jar", "beta.jar"]);

        let events = drain(&mut rx);
        let status = statuses(&events);
        let handoff = status
            .iter()
            .position(|s| s.step == "Lancement")
            .expect("handoff status");
        assert_eq!(status[handoff].progress, 60.0);
        assert_eq!(status[handoff].color, COLOR_LAUNCH);
        assert!(status[..handoff].iter().any(|s| s.step == "Installation terminée"));

        let bootstrap_progress: Vec<f64> = status
            .iter()
            .filter(|s| s.step == "Téléchargement Minecraft")
            .map(|s| s.progress)
            .collect();
        assert_eq!(bootstrap_progress, [77.5, 77.5]);

        let logs: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                LaunchEvent::Log { line } => Some(line.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(logs, ["[Render thread/INFO] Setting user: Alice"]);

        assert_eq!(status.last().unwrap().step, "Jeu fermé");
        assert_eq!(status.last().unwrap().progress, 100.0);
        let n = events.len();
        assert_eq!(events[n - 2], LaunchEvent::GameClosed { code: 0 });
        assert_eq!(
            events[n - 1],
            LaunchEvent::LaunchComplete {
                auth_kind: AuthKind::Offline,
                instance_id: "crazycity".into()
            }
        );

        let received = bootstrap.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].path, fx.game_dir());
        assert_eq!(received[0].mods_dir, mods_dir(&fx.game_dir()));
    }

    #[tokio::test]
    async fn offline_launch_builds_fresh_offline_identity() {
        let bootstrap = ScriptedBootstrap::new(vec![BootstrapEvent::Close(0)]);
        let fx = fixture("launch-offline", None, MockProvider::new(vec![]), bootstrap.clone());
        let (sink, _rx) = EventSink::channel();

        for _ in 0..2 {
            fx.launcher
                .launch(None, AccountSelector::offline("Alice"), &sink)
                .await
                .unwrap();
        }

        let received = bootstrap.received();
        let first = &received[0].authenticator;
        assert_eq!(first.meta.kind, AuthKind::Offline);
        assert!(first.meta.offline);
        assert_eq!(first.name, "Alice");
        let uuid = uuid::Uuid::parse_str(&first.uuid).unwrap();
        assert_eq!(uuid.get_version_num(), 4);
        assert_ne!(first.uuid, received[1].authenticator.uuid);
    }

    #[tokio::test]
    async fn settings_flow_into_the_configuration() {
        let bootstrap = ScriptedBootstrap::new(vec![BootstrapEvent::Close(0)]);
        let fx = fixture("launch-settings", None, MockProvider::new(vec![]), bootstrap.clone());
        assert!(fx.launcher.settings().save(&serde_json::json!({
            "memory": {"max": "8G"},
            "auto_connect": false
        })));
        let (sink, _rx) = EventSink::channel();

        fx.launcher
            .launch(None, AccountSelector::offline("Alice"), &sink)
            .await
            .unwrap();

        let config = &bootstrap.received()[0];
        assert_eq!(config.jvm_args, ["-Xmx8G", "-Xms2G"]);
        assert!(config.game_args.is_empty());
    }

    #[tokio::test]
    async fn microsoft_launch_uses_refreshed_account() {
        let bootstrap = ScriptedBootstrap::new(vec![BootstrapEvent::Close(0)]);
        let provider = MockProvider::new(vec![Ok(token_for("Steve")), Ok(token_for("Steve"))]);
        let fx = fixture("launch-microsoft", None, provider.clone(), bootstrap.clone());
        fx.launcher.auth().login().await.unwrap();
        let (sink, mut rx) = EventSink::channel();

        fx.launcher
            .launch(None, AccountSelector::Microsoft, &sink)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 2);
        let authenticator = &bootstrap.received()[0].authenticator;
        assert_eq!(authenticator.meta.kind, AuthKind::Microsoft);
        assert!(!authenticator.meta.offline);
        assert_eq!(authenticator.name, "Steve");
        assert_eq!(authenticator.access_token, "token-Steve");
        assert!(drain(&mut rx).contains(&LaunchEvent::LaunchComplete {
            auth_kind: AuthKind::Microsoft,
            instance_id: "crazycity".into()
        }));
    }

    #[tokio::test]
    async fn microsoft_launch_without_account_fails_before_delegation() {
        let bootstrap = ScriptedBootstrap::new(vec![BootstrapEvent::Close(0)]);
        let provider = MockProvider::new(vec![]);
        let fx = fixture("launch-no-account", None, provider.clone(), bootstrap.clone());
        let (sink, mut rx) = EventSink::channel();

        let err = fx
            .launcher
            .launch(None, AccountSelector::Microsoft, &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::NoAccount));
        assert_eq!(provider.calls(), 0);
        assert!(bootstrap.received().is_empty());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        match &events[0] {
            LaunchEvent::Status(s) => {
                assert_eq!(s.step, "Erreur");
                assert_eq!(s.color, COLOR_ERROR);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(events[1], LaunchEvent::LaunchError { .. }));
    }

    #[tokio::test]
    async fn invalidated_account_is_treated_as_missing() {
        let bootstrap = ScriptedBootstrap::new(vec![BootstrapEvent::Close(0)]);
        let provider = MockProvider::new(vec![
            Ok(token_for("Steve")),
            Err(ProviderError::Invalidated("invalid_grant".into())),
        ]);
        let fx = fixture("launch-invalidated", None, provider, bootstrap.clone());
        fx.launcher.auth().login().await.unwrap();
        let (sink, _rx) = EventSink::channel();

        let err = fx
            .launcher
            .launch(None, AccountSelector::Microsoft, &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::NoAccount));
        assert!(fx.launcher.auth().current_account().is_none());
    }

    #[tokio::test]
    async fn acquisition_failure_becomes_terminal_error() {
        let server = TestServer::start(vec![("/mods.zip", Route::status(404))]).await;
        let bootstrap = ScriptedBootstrap::new(vec![BootstrapEvent::Close(0)]);
        let fx = fixture(
            "launch-acquisition",
            Some(server.url("/mods.zip")),
            MockProvider::new(vec![]),
            bootstrap.clone(),
        );
        let (sink, mut rx) = EventSink::channel();

        let err = fx
            .launcher
            .launch(None, AccountSelector::offline("Alice"), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::Acquisition(_)));
        assert!(bootstrap.received().is_empty());
        match drain(&mut rx).last() {
            Some(LaunchEvent::LaunchError { error }) => {
                assert!(error.starts_with("Erreur lors du téléchargement ou extraction"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn bootstrap_error_is_reported_as_events() {
        let bootstrap = ScriptedBootstrap::new(vec![
            BootstrapEvent::Data("resolving".into()),
            BootstrapEvent::Error("java introuvable".into()),
            BootstrapEvent::Close(1),
        ]);
        let fx = fixture("launch-bootstrap-error", None, MockProvider::new(vec![]), bootstrap);
        let (sink, mut rx) = EventSink::channel();

        fx.launcher
            .launch(None, AccountSelector::offline("Alice"), &sink)
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&LaunchEvent::LaunchError {
                error: "java introuvable".into()
            })
        );
        assert!(!events
            .iter()
            .any(|e| matches!(e, LaunchEvent::GameClosed { .. } | LaunchEvent::LaunchComplete { .. })));
    }

    #[tokio::test]
    async fn bootstrap_ending_silently_is_an_error() {
        let bootstrap = ScriptedBootstrap::new(vec![BootstrapEvent::Progress {
            current: 1,
            total: 4,
            label: "client.jar".into(),
        }]);
        let fx = fixture("launch-silent", None, MockProvider::new(vec![]), bootstrap);
        let (sink, mut rx) = EventSink::channel();

        fx.launcher
            .launch(None, AccountSelector::offline("Alice"), &sink)
            .await
            .unwrap();

        assert!(matches!(
            drain(&mut rx).last(),
            Some(LaunchEvent::LaunchError { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_launch_of_same_instance_is_rejected() {
        let release = Arc::new(Notify::new());
        let bootstrap = ScriptedBootstrap::held(vec![BootstrapEvent::Close(0)], release.clone());
        let fx = fixture("launch-concurrent", None, MockProvider::new(vec![]), bootstrap.clone());
        let (first_sink, mut first_rx) = EventSink::channel();
        let (second_sink, mut second_rx) = EventSink::channel();

        let first = fx
            .launcher
            .launch(None, AccountSelector::offline("Alice"), &first_sink);
        let second = async {
            bootstrap.entered.notified().await;
            assert!(fx.launcher.is_launching("crazycity"));
            let result = fx
                .launcher
                .launch(Some("crazycity"), AccountSelector::offline("Bob"), &second_sink)
                .await;
            release.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        first.unwrap();
        assert!(matches!(second, Err(LauncherError::LaunchInProgress(id)) if id == "crazycity"));
        assert_eq!(bootstrap.received().len(), 1);
        assert!(!fx.launcher.is_launching("crazycity"));
        assert!(drain(&mut first_rx)
            .iter()
            .any(|e| matches!(e, LaunchEvent::LaunchComplete { .. })));
        assert!(matches!(
            drain(&mut second_rx).last(),
            Some(LaunchEvent::LaunchError { .. })
        ));
    }
}
