use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::account::Profile;

/// Public client id of the launcher's Azure application.
pub const DEFAULT_CLIENT_ID: &str = "00000000402b5328";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    DeviceCode,
}

/// Verification code the user has to enter on the provider's page before
/// `expires_at`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceCodePrompt {
    pub verification_uri: String,
    pub user_code: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

pub type DeviceCodeNotifier = Arc<dyn Fn(DeviceCodePrompt) + Send + Sync>;

/// Everything needed to construct a flow handle.
#[derive(Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub cache_dir: PathBuf,
    pub flow: AuthFlow,
    pub on_device_code: DeviceCodeNotifier,
}

impl ProviderConfig {
    pub fn new(cache_dir: PathBuf, on_device_code: DeviceCodeNotifier) -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.into(),
            cache_dir,
            flow: AuthFlow::DeviceCode,
            on_device_code,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("cache_dir", &self.cache_dir)
            .field("flow", &self.flow)
            .finish_non_exhaustive()
    }
}

/// Options of one token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRequest {
    pub fetch_profile: bool,
    /// Whether the provider may fall back to the interactive device-code flow
    /// when no cached grant is usable. Refreshes never prompt the user.
    pub interactive: bool,
}

impl TokenRequest {
    pub fn login() -> Self {
        Self {
            fetch_profile: true,
            interactive: true,
        }
    }

    pub fn refresh() -> Self {
        Self {
            fetch_profile: true,
            interactive: false,
        }
    }
}

/// Result of a token exchange. Either part may be missing when the provider
/// returns a partial answer.
#[derive(Debug, Clone, Default)]
pub struct TokenResponse {
    pub token: Option<String>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider revoked the cached grant; stored credentials are useless.
    #[error("account invalidated: {0}")]
    Invalidated(String),

    #[error("{0}")]
    Exchange(String),
}

/// One authentication-flow handle (device code + token cache).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Obtain a game token, silently from the cache when possible, otherwise
    /// through the interactive flow.
    async fn get_token(&self, request: TokenRequest) -> Result<TokenResponse, ProviderError>;
}

/// Builds flow handles; called lazily by the coordinator and again after
/// every logout.
pub trait IdentityProviderFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn IdentityProvider>, ProviderError>;
}
