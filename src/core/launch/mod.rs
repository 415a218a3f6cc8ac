pub mod bootstrap;
pub mod config;
pub mod events;
pub mod orchestrator;

pub use bootstrap::{
    BootstrapEvent, CommandBootstrap, GameBootstrap, BOOTSTRAP_ENV, DEFAULT_BOOTSTRAP_PROGRAM,
};
pub use config::{LaunchConfiguration, DEFAULT_JVM_ARGS, IGNORED_FILES};
pub use events::{EventSink, LaunchEvent, StatusUpdate};
pub use orchestrator::{mods_dir, remap_progress, AccountSelector, Launcher};
