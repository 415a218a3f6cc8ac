use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::auth::AuthKind;

// Colour hints understood by the UI.
pub const COLOR_DOWNLOAD: &str = "#2196f3";
pub const COLOR_SUCCESS: &str = "#4caf50";
pub const COLOR_LAUNCH: &str = "#9c27b0";
pub const COLOR_WORKING: &str = "#ff9800";
pub const COLOR_CLOSED: &str = "#607d8b";
pub const COLOR_ERROR: &str = "#f44336";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusUpdate {
    pub step: String,
    pub detail: String,
    /// Overall progress, `0.0..=100.0`.
    pub progress: f64,
    pub color: String,
}

/// What the caller of a launch observes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum LaunchEvent {
    Status(StatusUpdate),
    Log { line: String },
    GameClosed { code: i32 },
    LaunchError { error: String },
    #[serde(rename_all = "camelCase")]
    LaunchComplete {
        auth_kind: AuthKind,
        instance_id: String,
    },
}

/// Sending half of a launch event stream. A dropped receiver is not an
/// error: events are simply discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<LaunchEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LaunchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: LaunchEvent) {
        let _ = self.tx.send(event);
    }

    pub fn status(&self, step: &str, detail: impl Into<String>, progress: f64, color: &str) {
        self.emit(LaunchEvent::Status(StatusUpdate {
            step: step.to_string(),
            detail: detail.into(),
            progress: progress.clamp(0.0, 100.0),
            color: color.to_string(),
        }));
    }

    pub fn log(&self, line: impl Into<String>) {
        self.emit(LaunchEvent::Log { line: line.into() });
    }
}
