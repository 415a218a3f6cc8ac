pub mod archive;
pub mod pipeline;

pub use archive::extract_zip;
pub use pipeline::{count_mods, ModInstaller, ModsOutcome, MOD_EXTENSION};
