use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::account::{Account, SanitizedAccount};
use super::provider::{
    IdentityProvider, IdentityProviderFactory, ProviderConfig, ProviderError, TokenRequest,
    TokenResponse,
};
use super::store::AccountStore;
use crate::core::error::{AuthFailureKind, LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Idle,
    LoggingIn,
    RefreshPending,
    Authenticated,
    Failed,
}

/// Owns the authentication-flow handle and the stored Microsoft account.
///
/// Login, refresh and logout are serialized on one async lock; on top of that
/// a second concurrent `login` is rejected immediately instead of queuing.
pub struct AuthCoordinator {
    config: ProviderConfig,
    factory: Arc<dyn IdentityProviderFactory>,
    store: AccountStore,
    flow: Mutex<Option<Arc<dyn IdentityProvider>>>,
    login_in_flight: AtomicBool,
    gate: tokio::sync::Mutex<()>,
    state: Mutex<AuthState>,
}

/// Clears the in-flight flag when the login future finishes or is dropped.
struct LoginFlight<'a>(&'a AtomicBool);

impl<'a> LoginFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoginFlight(flag))
    }
}

impl Drop for LoginFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AuthCoordinator {
    pub fn new(
        config: ProviderConfig,
        factory: Arc<dyn IdentityProviderFactory>,
        store: AccountStore,
    ) -> Self {
        Self {
            config,
            factory,
            store,
            flow: Mutex::new(None),
            login_in_flight: AtomicBool::new(false),
            gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(AuthState::Idle),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn has_flow_handle(&self) -> bool {
        self.flow.lock().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    /// Stored account without any network call.
    pub fn current_account(&self) -> Option<Account> {
        self.store.read()
    }

    /// Run the interactive login and store the resulting account.
    pub async fn login(&self) -> LauncherResult<SanitizedAccount> {
        let _flight =
            LoginFlight::acquire(&self.login_in_flight).ok_or(LauncherError::LoginInProgress)?;
        let _gate = self.gate.lock().await;

        self.set_state(AuthState::LoggingIn);
        match self.login_locked().await {
            Ok(account) => {
                info!("Logged in as {}", account.name);
                self.set_state(AuthState::Authenticated);
                Ok(account.sanitize())
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                self.set_state(AuthState::Failed);
                Err(e)
            }
        }
    }

    async fn login_locked(&self) -> LauncherResult<Account> {
        let provider = self.flow_handle().map_err(provider_failure)?;
        let response = provider
            .get_token(TokenRequest::login())
            .await
            .map_err(provider_failure)?;

        let previous = self.store.read();
        let account = account_from_response(response, previous.as_ref())?;
        self.store.persist(&account);
        Ok(account)
    }

    /// Refresh the stored account.
    ///
    /// `None` when no account is stored (no network call) or when the
    /// provider invalidated it (stored copy deleted). Any other failure
    /// returns the stale stored account.
    pub async fn refresh(&self) -> Option<Account> {
        let _gate = self.gate.lock().await;
        let current = self.store.read()?;

        let previous_state = self.state();
        self.set_state(AuthState::RefreshPending);

        let outcome = match self.flow_handle() {
            Ok(provider) => provider.get_token(TokenRequest::refresh()).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => match account_from_response(response, Some(&current)) {
                Ok(account) => {
                    debug!("Refreshed account {}", account.name);
                    self.store.persist(&account);
                    self.set_state(AuthState::Authenticated);
                    Some(account)
                }
                Err(e) => {
                    warn!("Incomplete refresh response, keeping stored account: {}", e);
                    self.set_state(previous_state);
                    Some(current)
                }
            },
            Err(ProviderError::Invalidated(reason)) => {
                warn!("Account {} invalidated by provider: {}", current.name, reason);
                self.store.clear();
                self.set_state(AuthState::Idle);
                None
            }
            Err(e) => {
                warn!("Refresh failed, keeping stored account: {}", e);
                self.set_state(previous_state);
                Some(current)
            }
        }
    }

    /// Display-safe profile of the refreshed account.
    pub async fn get_profile(&self) -> Option<SanitizedAccount> {
        self.refresh().await.map(|account| account.sanitize())
    }

    /// Forget the account, wipe the token cache and drop the flow handle.
    pub async fn logout(&self) {
        let _gate = self.gate.lock().await;

        self.store.clear();
        let failures = clear_directory(&self.config.cache_dir);
        if failures > 0 {
            warn!("{} token cache entries could not be removed", failures);
        }
        *self.flow.lock().unwrap_or_else(|p| p.into_inner()) = None;
        self.set_state(AuthState::Idle);
        info!("Logged out");
    }

    fn flow_handle(&self) -> Result<Arc<dyn IdentityProvider>, ProviderError> {
        let mut flow = self.flow.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(provider) = flow.as_ref() {
            return Ok(provider.clone());
        }
        debug!("Creating authentication flow handle");
        let provider = self.factory.create(&self.config)?;
        *flow = Some(provider.clone());
        Ok(provider)
    }

    fn set_state(&self, state: AuthState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }
}

fn provider_failure(err: ProviderError) -> LauncherError {
    match err {
        ProviderError::Invalidated(message) => {
            LauncherError::authentication(AuthFailureKind::Rejected, message)
        }
        ProviderError::Exchange(message) => {
            LauncherError::authentication(AuthFailureKind::classify(&message), message)
        }
    }
}

fn account_from_response(
    response: TokenResponse,
    previous: Option<&Account>,
) -> LauncherResult<Account> {
    let token = response
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            LauncherError::authentication(AuthFailureKind::Rejected, "no token returned")
        })?;
    let profile = response.profile.ok_or_else(|| {
        LauncherError::authentication(AuthFailureKind::Rejected, "no Minecraft profile returned")
    })?;

    let client_token = previous
        .map(|a| a.client_token.clone())
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    Ok(Account::from_profile(token, client_token, profile))
}

/// Delete every entry of `dir`, returning how many could not be removed.
fn clear_directory(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!("Cannot list token cache {:?}: {}", dir, e);
            return 1;
        }
    };

    let mut failures = 0;
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("Cannot read token cache entry: {}", e);
                failures += 1;
                continue;
            }
        };
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(e) = result {
            warn!("Cannot remove {:?}: {}", path, e);
            failures += 1;
        }
    }
    failures
}
