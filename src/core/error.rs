use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failed login or token exchange.
///
/// The category is stable; the human-readable label is presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailureKind {
    Cancelled,
    Timeout,
    Network,
    Rejected,
}

impl AuthFailureKind {
    /// Classify a raw message coming out of the identity provider.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("cancel") || lower.contains("declined") || lower.contains("closed by user") {
            AuthFailureKind::Cancelled
        } else if lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("expired_token")
            || lower.contains("expired")
        {
            AuthFailureKind::Timeout
        } else if lower.contains("network")
            || lower.contains("enotfound")
            || lower.contains("econnrefused")
            || lower.contains("dns")
            || lower.contains("connect")
            || lower.contains("unreachable")
        {
            AuthFailureKind::Network
        } else {
            AuthFailureKind::Rejected
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AuthFailureKind::Cancelled => "Connexion annulée par l'utilisateur",
            AuthFailureKind::Timeout => "Délai de connexion dépassé",
            AuthFailureKind::Network => "Impossible de joindre les serveurs Microsoft",
            AuthFailureKind::Rejected => "Échec de l'authentification",
        }
    }
}

impl std::fmt::Display for AuthFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Central error type for the launcher core.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── Configuration ───────────────────────────────────
    #[error("Erreur de configuration : {0}")]
    Configuration(String),

    // ── Authentication ──────────────────────────────────
    #[error("Une connexion est déjà en cours")]
    LoginInProgress,

    #[error("{kind}: {message}")]
    Authentication {
        kind: AuthFailureKind,
        message: String,
    },

    #[error("Aucun compte Microsoft valide, veuillez vous reconnecter")]
    NoAccount,

    // ── Acquisition ─────────────────────────────────────
    #[error("Erreur lors du téléchargement ou extraction : {0}")]
    Acquisition(String),

    // ── Launch ──────────────────────────────────────────
    #[error("L'instance {0} est déjà en cours de lancement")]
    LaunchInProgress(String),

    #[error("{0}")]
    LaunchDelegation(String),

    // ── IO ──────────────────────────────────────────────
    #[error("Erreur d'accès au fichier {path:?} : {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("Échec de la requête HTTP : {0}")]
    Http(#[from] reqwest::Error),

    #[error("Erreur HTTP {status} pour {url}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Trop de redirections (plus de {limit}) pour {url}")]
    TooManyRedirects { url: String, limit: usize },

    // ── JSON ────────────────────────────────────────────
    #[error("Données JSON invalides : {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Archive zip invalide : {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

impl LauncherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn authentication(kind: AuthFailureKind, message: impl Into<String>) -> Self {
        LauncherError::Authentication {
            kind,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// Errors travel to the caller inside event payloads as plain strings.
impl Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
