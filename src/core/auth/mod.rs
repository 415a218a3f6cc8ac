pub mod account;
pub mod coordinator;
pub mod microsoft;
pub mod provider;
pub mod store;

pub use account::{Account, AuthKind, Authenticator, Profile, SanitizedAccount, Skin};
pub use coordinator::{AuthCoordinator, AuthState};
pub use microsoft::{MicrosoftDeviceCodeProvider, MicrosoftEndpoints, MicrosoftProviderFactory};
pub use provider::{
    AuthFlow, DeviceCodeNotifier, DeviceCodePrompt, IdentityProvider, IdentityProviderFactory,
    ProviderConfig, ProviderError, TokenRequest, TokenResponse, DEFAULT_CLIENT_ID,
};
pub use store::AccountStore;
