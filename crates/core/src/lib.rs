//! lazyweights_core - Lazy, deduplicated background downloads
//!
//! This crate provides:
//! - Marker path derivation and remote locator construction
//! - The launch decision (spawn a downloader, or leave it to someone else)
//! - Completion waits via the owned process handle or filesystem polling
//! - A stateful `LazyFile` handle and batch launch manifests

pub mod config;
pub mod error;
pub mod fetcher;
pub mod gate;
pub mod lazy;
pub mod manifest;
pub mod paths;
pub mod poll;

pub use config::{Config, SentinelMode};
pub use error::{FetchError, Result};
pub use fetcher::{DownloadHandle, FetchConfig, Fetcher, FileState, WaitOutcome};
pub use gate::Gate;
pub use lazy::{launch, launch_with, wait, wait_with, LazyFile};
pub use manifest::{Manifest, ManifestEntry, ManifestError};
pub use paths::{sentinel_path, source_url, Target, MARKER_SUFFIX};
pub use poll::{wait_for, wait_for_async, DEFAULT_POLL_INTERVAL};
