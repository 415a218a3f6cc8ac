// ─── Game bootstrap ───
// The component that resolves game/loader artifacts and spawns the game is
// external; the orchestrator only sees a stream of lifecycle events.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::LaunchConfiguration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapEvent {
    Progress {
        current: u64,
        total: u64,
        label: String,
    },
    Data(String),
    Close(i32),
    Error(String),
}

/// Contract of the external game bootstrap.
///
/// Implementations push events on `events` and finish with exactly one
/// `Close` or `Error`. Events sent after that are ignored.
#[async_trait]
pub trait GameBootstrap: Send + Sync {
    async fn launch(&self, config: LaunchConfiguration, events: mpsc::Sender<BootstrapEvent>);
}

/// Bootstrap backed by an external executable.
///
/// The launch configuration is written as JSON on the child's stdin. Stdout
/// lines of the form `@progress <current> <total> <label>` become progress
/// events; every other stdout/stderr line is relayed as data. The exit code
/// closes the stream.
#[derive(Debug, Clone)]
pub struct CommandBootstrap {
    program: PathBuf,
    args: Vec<String>,
}

/// Names the bootstrap executable used by [`CommandBootstrap::from_env`].
pub const BOOTSTRAP_ENV: &str = "CRAZYCITY_LAUNCHER_BOOTSTRAP";
pub const DEFAULT_BOOTSTRAP_PROGRAM: &str = "crazycity-bootstrap";

impl CommandBootstrap {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Program from [`BOOTSTRAP_ENV`], or [`DEFAULT_BOOTSTRAP_PROGRAM`] on the PATH.
    pub fn from_env() -> Self {
        match std::env::var_os(BOOTSTRAP_ENV) {
            Some(program) if !program.is_empty() => Self::new(program),
            _ => Self::new(DEFAULT_BOOTSTRAP_PROGRAM),
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    async fn run(
        &self,
        config: &LaunchConfiguration,
        events: &mpsc::Sender<BootstrapEvent>,
    ) -> Result<i32, String> {
        let payload = serde_json::to_vec(config).map_err(|e| e.to_string())?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Starting game bootstrap {:?}", self.program);
        let mut child = cmd
            .spawn()
            .map_err(|e| format!("Impossible de démarrer {:?}: {e}", self.program))?;

        // Dropping stdin closes the pipe so the child sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                warn!("Bootstrap did not read its configuration: {}", e);
            }
        }

        let stderr_task = child.stderr.take().map(|stderr| {
            let events = events.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = events.send(BootstrapEvent::Data(line)).await;
                }
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let event = parse_progress_line(&line).unwrap_or(BootstrapEvent::Data(line));
                let _ = events.send(event).await;
            }
        }

        if let Some(task) = stderr_task {
            if let Err(e) = task.await {
                warn!("stderr reader ended abnormally: {}", e);
            }
        }

        let status = child.wait().await.map_err(|e| e.to_string())?;
        debug!("Game bootstrap exited with {:?}", status);
        Ok(status.code().unwrap_or(-1))
    }
}

#[async_trait]
impl GameBootstrap for CommandBootstrap {
    async fn launch(&self, config: LaunchConfiguration, events: mpsc::Sender<BootstrapEvent>) {
        let terminal = match self.run(&config, &events).await {
            Ok(code) => BootstrapEvent::Close(code),
            Err(message) => BootstrapEvent::Error(message),
        };
        let _ = events.send(terminal).await;
    }
}

fn parse_progress_line(line: &str) -> Option<BootstrapEvent> {
    let rest = line.trim().strip_prefix("@progress")?;
    let mut parts = rest.split_whitespace();
    let current = parts.next()?.parse().ok()?;
    let total = parts.next()?.parse().ok()?;
    let label = parts.collect::<Vec<_>>().join(" ");
    Some(BootstrapEvent::Progress {
        current,
        total,
        label,
    })
}
