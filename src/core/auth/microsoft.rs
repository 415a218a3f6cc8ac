// ─── Microsoft device-code provider ───
// Microsoft OAuth (device code) → Xbox Live → XSTS → Minecraft services.
// The Microsoft refresh token is cached in the provider's cache directory so
// later exchanges run silently.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::account::{Profile, Skin};
use super::provider::{
    DeviceCodePrompt, IdentityProvider, IdentityProviderFactory, ProviderConfig, ProviderError,
    TokenRequest, TokenResponse,
};
use crate::core::http::build_api_client;
use crate::core::persist;

const MS_DEVICE_CODE_URL: &str =
    "https://login.microsoftonline.com/consumers/oauth2/v2.0/devicecode";
const MS_TOKEN_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";
const MS_SCOPE: &str = "XboxLive.signin offline_access";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

const XBOX_AUTH_URL: &str = "https://user.auth.xboxlive.com/user/authenticate";
const XBOX_XSTS_URL: &str = "https://xsts.auth.xboxlive.com/xsts/authorize";
const MC_AUTH_URL: &str = "https://api.minecraftservices.com/authentication/login_with_xbox";
const MC_PROFILE_URL: &str = "https://api.minecraftservices.com/minecraft/profile";

const TOKEN_CACHE_FILE: &str = "microsoft-token.json";
/// Extra seconds between polls after a `slow_down` answer.
const SLOW_DOWN_STEP: u64 = 5;

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default = "default_poll_interval")]
    interval: u64,
    #[serde(default)]
    message: String,
}

fn default_poll_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct MsTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XboxAuthResponse {
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "DisplayClaims")]
    display_claims: DisplayClaims,
}

#[derive(Debug, Deserialize)]
struct DisplayClaims {
    xui: Vec<Xui>,
}

#[derive(Debug, Deserialize)]
struct Xui {
    uhs: String,
}

#[derive(Debug, Deserialize)]
struct MinecraftAuthResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MinecraftProfileResponse {
    id: String,
    name: String,
    #[serde(default)]
    skins: Vec<Skin>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedGrant {
    refresh_token: String,
    obtained_at: DateTime<Utc>,
}

/// Service URLs used by the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrosoftEndpoints {
    pub device_code: String,
    pub token: String,
    pub xbox_auth: String,
    pub xsts: String,
    pub minecraft_login: String,
    pub minecraft_profile: String,
}

impl Default for MicrosoftEndpoints {
    fn default() -> Self {
        Self {
            device_code: MS_DEVICE_CODE_URL.into(),
            token: MS_TOKEN_URL.into(),
            xbox_auth: XBOX_AUTH_URL.into(),
            xsts: XBOX_XSTS_URL.into(),
            minecraft_login: MC_AUTH_URL.into(),
            minecraft_profile: MC_PROFILE_URL.into(),
        }
    }
}

/// What to do with one answer of the device-code polling loop.
#[derive(Debug)]
enum PollStep {
    /// Poll again after the given number of interval units.
    Wait(u64),
    Fail(ProviderError),
}

fn poll_step(error: &OAuthErrorResponse, interval: u64) -> PollStep {
    match error.error.as_str() {
        "authorization_pending" => PollStep::Wait(interval),
        "slow_down" => PollStep::Wait(interval + SLOW_DOWN_STEP),
        "authorization_declined" => PollStep::Fail(ProviderError::Exchange(
            "authorization_declined: login cancelled by user".into(),
        )),
        "expired_token" => PollStep::Fail(ProviderError::Exchange(
            "expired_token: the device code timed out".into(),
        )),
        other => PollStep::Fail(ProviderError::Exchange(format!(
            "{other}: {}",
            error.error_description.clone().unwrap_or_default()
        ))),
    }
}

/// Flow handle talking to the Microsoft and Minecraft services.
pub struct MicrosoftDeviceCodeProvider {
    client: Client,
    config: ProviderConfig,
    endpoints: MicrosoftEndpoints,
    poll_unit: Duration,
}

impl MicrosoftDeviceCodeProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = build_api_client().map_err(|e| ProviderError::Exchange(e.to_string()))?;
        Ok(Self {
            client,
            config,
            endpoints: MicrosoftEndpoints::default(),
            poll_unit: Duration::from_secs(1),
        })
    }

    pub fn with_endpoints(mut self, endpoints: MicrosoftEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Length of one polling interval unit (the service counts in seconds).
    pub fn with_poll_unit(mut self, unit: Duration) -> Self {
        self.poll_unit = unit;
        self
    }

    fn cache_path(&self) -> PathBuf {
        self.config.cache_dir.join(TOKEN_CACHE_FILE)
    }

    fn load_cached_grant(&self) -> Option<CachedGrant> {
        match persist::read_json::<CachedGrant>(&self.cache_path()) {
            Ok(grant) => grant,
            Err(e) => {
                warn!("Ignoring unreadable token cache: {}", e);
                None
            }
        }
    }

    fn store_grant(&self, refresh_token: &str) {
        let grant = CachedGrant {
            refresh_token: refresh_token.to_string(),
            obtained_at: Utc::now(),
        };
        if let Err(e) = persist::write_json_atomic(&self.cache_path(), &grant) {
            warn!("Cannot write token cache: {}", e);
        }
    }

    fn drop_cached_grant(&self) {
        let _ = std::fs::remove_file(self.cache_path());
    }

    // ── Microsoft OAuth ─────────────────────────────────

    async fn refresh_ms_token(&self, refresh_token: &str) -> Result<MsTokenResponse, ProviderError> {
        debug!("Refreshing Microsoft token from cache");
        let response = self
            .client
            .post(&self.endpoints.token)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", MS_SCOPE),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            return response.json().await.map_err(transport_error);
        }

        let status = response.status();
        let body: Option<OAuthErrorResponse> = response.json().await.ok();
        match body {
            Some(err) if err.error == "invalid_grant" => Err(ProviderError::Invalidated(
                err.error_description.unwrap_or(err.error),
            )),
            Some(err) => Err(ProviderError::Exchange(format!(
                "{}: {}",
                err.error,
                err.error_description.unwrap_or_default()
            ))),
            None => Err(ProviderError::Exchange(format!(
                "token refresh failed with HTTP {status}"
            ))),
        }
    }

    async fn device_code_flow(&self) -> Result<MsTokenResponse, ProviderError> {
        let device: DeviceCodeResponse = self
            .client
            .post(&self.endpoints.device_code)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", MS_SCOPE),
            ])
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        let expires_at = Utc::now() + chrono::Duration::seconds(device.expires_in as i64);
        info!("Device code issued, waiting for user at {}", device.verification_uri);
        (self.config.on_device_code)(DeviceCodePrompt {
            verification_uri: device.verification_uri.clone(),
            user_code: device.user_code.clone(),
            message: device.message.clone(),
            expires_at,
        });

        let mut interval = device.interval.max(1);
        loop {
            if Utc::now() >= expires_at {
                return Err(ProviderError::Exchange(
                    "expired_token: the device code timed out".into(),
                ));
            }
            tokio::time::sleep(self.poll_unit * interval as u32).await;

            let response = self
                .client
                .post(&self.endpoints.token)
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.config.client_id.as_str()),
                    ("device_code", device.device_code.as_str()),
                ])
                .send()
                .await
                .map_err(transport_error)?;

            if response.status().is_success() {
                return response.json().await.map_err(transport_error);
            }

            let err: OAuthErrorResponse = response.json().await.map_err(transport_error)?;
            match poll_step(&err, interval) {
                PollStep::Wait(next) => {
                    if next != interval {
                        debug!("Device code polling slowed down to {}s", next);
                    }
                    interval = next;
                }
                PollStep::Fail(e) => return Err(e),
            }
        }
    }

    // ── Xbox / Minecraft services ───────────────────────

    async fn xbox_chain(&self, ms_access_token: &str) -> Result<String, ProviderError> {
        let xbl: XboxAuthResponse = self
            .client
            .post(&self.endpoints.xbox_auth)
            .json(&json!({
                "Properties": {
                    "AuthMethod": "RPS",
                    "SiteName": "user.auth.xboxlive.com",
                    "RpsTicket": format!("d={ms_access_token}"),
                },
                "RelyingParty": "http://auth.xboxlive.com",
                "TokenType": "JWT",
            }))
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        let response = self
            .client
            .post(&self.endpoints.xsts)
            .json(&json!({
                "Properties": {
                    "SandboxId": "RETAIL",
                    "UserTokens": [xbl.token],
                },
                "RelyingParty": "rp://api.minecraftservices.com/",
                "TokenType": "JWT",
            }))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Exchange(
                "XSTS rejected the account (no Xbox profile or child account)".into(),
            ));
        }
        let xsts: XboxAuthResponse = response
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        let uhs = xsts
            .display_claims
            .xui
            .first()
            .map(|x| x.uhs.clone())
            .ok_or_else(|| ProviderError::Exchange("XSTS response without user hash".into()))?;

        let mc: MinecraftAuthResponse = self
            .client
            .post(&self.endpoints.minecraft_login)
            .json(&json!({ "identityToken": format!("XBL3.0 x={uhs};{}", xsts.token) }))
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        Ok(mc.access_token)
    }

    async fn fetch_profile(&self, game_token: &str) -> Result<Option<Profile>, ProviderError> {
        let response = self
            .client
            .get(&self.endpoints.minecraft_profile)
            .bearer_auth(game_token)
            .send()
            .await
            .map_err(transport_error)?;

        // 404: the account does not own the game.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let profile: MinecraftProfileResponse = response
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        Ok(Some(Profile {
            id: profile.id,
            name: profile.name,
            skins: profile.skins,
        }))
    }
}

#[async_trait]
impl IdentityProvider for MicrosoftDeviceCodeProvider {
    async fn get_token(&self, request: TokenRequest) -> Result<TokenResponse, ProviderError> {
        let ms_token = match self.load_cached_grant() {
            Some(grant) => match self.refresh_ms_token(&grant.refresh_token).await {
                Ok(token) => token,
                Err(ProviderError::Invalidated(reason)) if request.interactive => {
                    warn!("Cached grant rejected ({}), starting device code flow", reason);
                    self.drop_cached_grant();
                    self.device_code_flow().await?
                }
                Err(e @ ProviderError::Invalidated(_)) => {
                    self.drop_cached_grant();
                    return Err(e);
                }
                Err(e) => return Err(e),
            },
            None if request.interactive => self.device_code_flow().await?,
            None => {
                return Err(ProviderError::Invalidated(
                    "no cached grant to refresh".into(),
                ))
            }
        };

        if let Some(refresh_token) = ms_token.refresh_token.as_deref() {
            self.store_grant(refresh_token);
        }

        let game_token = self.xbox_chain(&ms_token.access_token).await?;
        let profile = if request.fetch_profile {
            self.fetch_profile(&game_token).await?
        } else {
            None
        };

        Ok(TokenResponse {
            token: Some(game_token),
            profile,
        })
    }
}

/// Factory used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct MicrosoftProviderFactory;

impl IdentityProviderFactory for MicrosoftProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn IdentityProvider>, ProviderError> {
        std::fs::create_dir_all(&config.cache_dir)
            .map_err(|e| ProviderError::Exchange(format!("token cache unavailable: {e}")))?;
        Ok(Arc::new(MicrosoftDeviceCodeProvider::new(config.clone())?))
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Exchange(format!("timeout: {e}"))
    } else if e.is_connect() {
        ProviderError::Exchange(format!("network unreachable: {e}"))
    } else {
        ProviderError::Exchange(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AuthFailureKind;
    use crate::core::test_support::{Route, TempDir, TestServer};
    use std::sync::Mutex;

    fn provider_for(server: &TestServer, dir: &TempDir) -> MicrosoftDeviceCodeProvider {
        provider_with_notifier(server, dir, Arc::new(|_: DeviceCodePrompt| {}))
    }

    fn provider_with_notifier(
        server: &TestServer,
        dir: &TempDir,
        notifier: crate::core::auth::DeviceCodeNotifier,
    ) -> MicrosoftDeviceCodeProvider {
        let config = ProviderConfig::new(dir.path().join("msal-cache"), notifier);
        MicrosoftDeviceCodeProvider::new(config)
            .unwrap()
            .with_endpoints(MicrosoftEndpoints {
                device_code: server.url("/devicecode"),
                token: server.url("/token"),
                xbox_auth: server.url("/xbl"),
                xsts: server.url("/xsts"),
                minecraft_login: server.url("/mc/login"),
                minecraft_profile: server.url("/mc/profile"),
            })
            .with_poll_unit(Duration::from_millis(1))
    }

    fn device_code_route() -> (&'static str, Route) {
        (
            "/devicecode",
            Route::json(
                200,
                json!({
                    "device_code": "dc-123",
                    "user_code": "ABCD-EFGH",
                    "verification_uri": "https://www.microsoft.com/link",
                    "expires_in": 900,
                    "interval": 1,
                    "message": "Enter ABCD-EFGH"
                }),
            ),
        )
    }

    fn game_routes(profile: Route) -> Vec<(&'static str, Route)> {
        let xbox = json!({"Token": "xbox-token", "DisplayClaims": {"xui": [{"uhs": "user-hash"}]}});
        vec![
            ("/xbl", Route::json(200, xbox.clone())),
            ("/xsts", Route::json(200, xbox)),
            ("/mc/login", Route::json(200, json!({"access_token": "game-token"}))),
            ("/mc/profile", profile),
        ]
    }

    fn token_ok() -> Route {
        Route::json(
            200,
            json!({"access_token": "ms-access", "refresh_token": "ms-refresh"}),
        )
    }

    fn oauth_error(code: &str) -> Route {
        Route::json(400, json!({"error": code, "error_description": "from test"}))
    }

    #[tokio::test]
    async fn interactive_login_runs_the_whole_chain_and_caches_the_grant() {
        let mut routes = vec![device_code_route(), ("/token", token_ok())];
        routes.extend(game_routes(Route::json(
            200,
            json!({"id": "steve-id", "name": "Steve", "skins": []}),
        )));
        let server = TestServer::start(routes).await;
        let dir = TempDir::new("ms-login");
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let seen = prompts.clone();
        let provider = provider_with_notifier(
            &server,
            &dir,
            Arc::new(move |prompt: DeviceCodePrompt| seen.lock().unwrap().push(prompt.user_code)),
        );

        let response = provider.get_token(TokenRequest::login()).await.unwrap();

        assert_eq!(response.token.as_deref(), Some("game-token"));
        assert_eq!(response.profile.unwrap().name, "Steve");
        assert_eq!(*prompts.lock().unwrap(), ["ABCD-EFGH"]);
        let grant = provider.load_cached_grant().unwrap();
        assert_eq!(grant.refresh_token, "ms-refresh");
    }

    #[tokio::test]
    async fn account_without_game_profile_returns_no_profile() {
        let mut routes = vec![device_code_route(), ("/token", token_ok())];
        routes.extend(game_routes(Route::status(404)));
        let server = TestServer::start(routes).await;
        let dir = TempDir::new("ms-no-profile");

        let response = provider_for(&server, &dir)
            .get_token(TokenRequest::login())
            .await
            .unwrap();

        assert_eq!(response.token.as_deref(), Some("game-token"));
        assert!(response.profile.is_none());
    }

    #[tokio::test]
    async fn revoked_grant_invalidates_and_drops_the_cache() {
        let server = TestServer::start(vec![("/token", oauth_error("invalid_grant"))]).await;
        let dir = TempDir::new("ms-invalid-grant");
        let provider = provider_for(&server, &dir);
        provider.store_grant("stale-refresh");
        assert!(provider.cache_path().exists());

        let err = provider
            .get_token(TokenRequest::refresh())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Invalidated(_)));
        assert!(!provider.cache_path().exists());
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn refresh_without_cached_grant_is_an_invalidation_without_network() {
        let server = TestServer::start(vec![]).await;
        let dir = TempDir::new("ms-no-grant");

        let err = provider_for(&server, &dir)
            .get_token(TokenRequest::refresh())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Invalidated(_)));
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn declined_device_code_is_classified_as_cancelled() {
        let server = TestServer::start(vec![
            device_code_route(),
            ("/token", oauth_error("authorization_declined")),
        ])
        .await;
        let dir = TempDir::new("ms-declined");

        let err = provider_for(&server, &dir)
            .get_token(TokenRequest::login())
            .await
            .unwrap_err();

        match err {
            ProviderError::Exchange(message) => {
                assert_eq!(AuthFailureKind::classify(&message), AuthFailureKind::Cancelled)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_device_code_is_classified_as_timeout() {
        let server = TestServer::start(vec![
            device_code_route(),
            ("/token", oauth_error("expired_token")),
        ])
        .await;
        let dir = TempDir::new("ms-expired");

        let err = provider_for(&server, &dir)
            .get_token(TokenRequest::login())
            .await
            .unwrap_err();

        match err {
            ProviderError::Exchange(message) => {
                assert_eq!(AuthFailureKind::classify(&message), AuthFailureKind::Timeout)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn slow_down_lengthens_the_polling_interval() {
        let answer = |code: &str| OAuthErrorResponse {
            error: code.into(),
            error_description: None,
        };

        assert!(matches!(poll_step(&answer("authorization_pending"), 3), PollStep::Wait(3)));
        assert!(matches!(poll_step(&answer("slow_down"), 3), PollStep::Wait(8)));
        assert!(matches!(
            poll_step(&answer("bad_verification_code"), 3),
            PollStep::Fail(ProviderError::Exchange(_))
        ));
    }

    #[test]
    fn deserialize_minecraft_profile_with_skins() {
        let json = r#"{
            "id": "069a79f444e94726a5befca90e38aaf5",
            "name": "Notch",
            "skins": [{
                "id": "6a6e65e5-76dd-4c3c-a625-162924514568",
                "state": "ACTIVE",
                "url": "http://textures.minecraft.net/texture/abc",
                "variant": "CLASSIC"
            }],
            "capes": []
        }"#;
        let profile: MinecraftProfileResponse = serde_json::from_str(json).unwrap();
        assert_eq!(profile.name, "Notch");
        assert!(profile.skins[0].is_active());
    }

    #[test]
    fn device_code_response_defaults_interval() {
        let json = r#"{
            "device_code": "dc",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://www.microsoft.com/link",
            "expires_in": 900
        }"#;
        let device: DeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(device.interval, 5);
        assert_eq!(device.user_code, "ABCD-EFGH");
    }
}
