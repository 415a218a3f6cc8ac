// ─── CrazyCity Launcher Core ───
// Instance, account and launch orchestration for a modded game client.
//
// Architecture:
//   core/
//     settings/    User settings + merge-on-save store
//     instance/    Static instance table
//     auth/        Accounts, identity providers, login/refresh/logout
//     downloader/  Streaming downloads with bounded redirects
//     mods/        Mod bundle acquisition (download + staged extraction)
//     launch/      Events, launch configuration, bootstrap, orchestrator
//     state/       Paths and application wiring

pub mod auth;
pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod launch;
pub mod mods;
pub mod persist;
pub mod settings;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
