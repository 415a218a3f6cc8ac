pub mod client;

pub use client::{DownloadProgress, Downloader, MAX_REDIRECTS};
