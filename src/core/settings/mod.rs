pub mod model;
pub mod store;

pub use model::{MemoryBounds, ScreenConfig, Settings};
pub use store::SettingsStore;
