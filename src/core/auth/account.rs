use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest name the game accepts for an offline player.
pub const MAX_OFFLINE_NAME_LEN: usize = 16;
pub const DEFAULT_OFFLINE_NAME: &str = "Joueur";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Offline,
    Microsoft,
}

impl std::fmt::Display for AuthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthKind::Offline => write!(f, "offline"),
            AuthKind::Microsoft => write!(f, "microsoft"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Skin {
    pub id: String,
    /// `ACTIVE` for the skin currently worn.
    #[serde(default)]
    pub state: String,
    pub url: String,
    #[serde(default)]
    pub variant: Option<String>,
}

impl Skin {
    pub fn is_active(&self) -> bool {
        self.state.eq_ignore_ascii_case("active")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub skins: Vec<Skin>,
}

/// Microsoft-authenticated player as stored in `accounts/microsoft.json`.
///
/// Tokens are kept in clear; never hand this struct to a display layer,
/// use [`Account::sanitize`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub uuid: String,
    pub access_token: String,
    pub client_token: String,
    pub profile: Profile,
    pub kind: AuthKind,
    #[serde(default)]
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Display-safe view of an [`Account`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SanitizedAccount {
    #[serde(rename = "type")]
    pub kind: AuthKind,
    pub username: String,
    pub id: String,
    pub avatar: Option<String>,
}

impl Account {
    pub fn from_profile(access_token: String, client_token: String, profile: Profile) -> Self {
        Self {
            name: profile.name.clone(),
            uuid: profile.id.clone(),
            access_token,
            client_token,
            profile,
            kind: AuthKind::Microsoft,
            refreshed_at: Some(Utc::now()),
        }
    }

    /// Active skin, else the first skin, else nothing.
    pub fn avatar(&self) -> Option<String> {
        self.profile
            .skins
            .iter()
            .find(|s| s.is_active())
            .or_else(|| self.profile.skins.first())
            .map(|s| s.url.clone())
    }

    pub fn sanitize(&self) -> SanitizedAccount {
        SanitizedAccount {
            kind: self.kind,
            username: self.name.clone(),
            id: self.uuid.clone(),
            avatar: self.avatar(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticatorMeta {
    #[serde(rename = "type")]
    pub kind: AuthKind,
    pub offline: bool,
}

/// Credential payload handed to the game bootstrap for one launch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Authenticator {
    pub name: String,
    pub uuid: String,
    pub access_token: String,
    pub client_token: String,
    pub user_properties: String,
    pub meta: AuthenticatorMeta,
}

impl Authenticator {
    /// Offline identity with a fresh random v4 UUID. Blank names become
    /// [`DEFAULT_OFFLINE_NAME`]; long names are cut to 16 characters.
    pub fn offline(username: &str) -> Self {
        let trimmed = username.trim();
        let name = if trimmed.is_empty() {
            DEFAULT_OFFLINE_NAME.to_string()
        } else {
            trimmed.chars().take(MAX_OFFLINE_NAME_LEN).collect()
        };

        Self {
            name,
            uuid: Uuid::new_v4().to_string(),
            access_token: "null".into(),
            client_token: "null".into(),
            user_properties: "{}".into(),
            meta: AuthenticatorMeta {
                kind: AuthKind::Offline,
                offline: true,
            },
        }
    }

    pub fn from_account(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            uuid: account.uuid.clone(),
            access_token: account.access_token.clone(),
            client_token: account.client_token.clone(),
            user_properties: "{}".into(),
            meta: AuthenticatorMeta {
                kind: account.kind,
                offline: false,
            },
        }
    }

    pub fn kind(&self) -> AuthKind {
        self.meta.kind
    }
}

#[cfg(test)]
pub(crate) fn sample_account(name: &str) -> Account {
    Account::from_profile(
        format!("access-{name}"),
        format!("client-{name}"),
        Profile {
            id: format!("{name}-id"),
            name: name.to_string(),
            skins: vec![
                Skin {
                    id: "s1".into(),
                    state: "INACTIVE".into(),
                    url: "https://textures.example/first".into(),
                    variant: Some("CLASSIC".into()),
                },
                Skin {
                    id: "s2".into(),
                    state: "ACTIVE".into(),
                    url: "https://textures.example/active".into(),
                    variant: Some("SLIM".into()),
                },
            ],
        },
    )
}
