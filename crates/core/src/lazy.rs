//! Request a file early, block on it later.
//!
//! ```no_run
//! use lazyweights_core::{Fetcher, LazyFile};
//!
//! # fn main() -> lazyweights_core::Result<()> {
//! // at startup
//! let mut weights = LazyFile::new(Fetcher::default(), "weights.bin")?;
//!
//! // ... expensive imports, other setup ...
//!
//! // when the file is actually needed
//! weights.wait()?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{DownloadHandle, Fetcher, WaitOutcome};
use crate::paths::Target;
use crate::poll::wait_for;

/// A launch made at construction time, paired with its own wait.
#[derive(Debug)]
pub struct LazyFile {
    fetcher: Fetcher,
    target: Target,
    url: String,
    handle: Option<DownloadHandle>,
}

impl LazyFile {
    pub fn new(fetcher: Fetcher, name: impl AsRef<Path>) -> Result<Self> {
        let target = fetcher.target(name);
        let url = fetcher.url_for(&target.name);
        Self::launched(fetcher, target, url)
    }

    pub fn with_source(
        fetcher: Fetcher,
        name: impl AsRef<Path>,
        url: impl Into<String>,
    ) -> Result<Self> {
        let target = fetcher.target(name);
        Self::launched(fetcher, target, url.into())
    }

    fn launched(fetcher: Fetcher, target: Target, url: String) -> Result<Self> {
        let handle = fetcher.launch_target(&target, &url)?;
        Ok(Self {
            fetcher,
            target,
            url,
            handle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.target.path
    }

    /// Whether this instance spawned a downloader it has not yet waited on.
    pub fn owns_download(&self) -> bool {
        self.handle.is_some()
    }

    /// Block until the file is available. The first call consumes the
    /// process handle; later calls poll and return once the file exists.
    pub fn wait(&mut self) -> Result<WaitOutcome> {
        let handle = self.handle.take();
        self.fetcher.wait_target(&self.target, &self.url, handle)
    }
}

/// Fire-and-forget launch using the user's config. The downloader, if one is
/// started, is not tracked; pair with [`wait`].
pub fn launch(name: impl AsRef<Path>) -> anyhow::Result<()> {
    launch_with(&Config::load()?, name)?;
    Ok(())
}

/// Poll until `name` exists, resolving it the same way [`launch`] does.
pub fn wait(name: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
    Ok(wait_with(&Config::load()?, name)?)
}

/// [`launch`] with an explicit config.
pub fn launch_with(config: &Config, name: impl AsRef<Path>) -> Result<()> {
    let fetcher = Fetcher::from_config(config);
    if let Some(handle) = fetcher.launch(name)? {
        tracing::debug!("Detached downloader pid {}", handle.pid());
    }
    Ok(())
}

/// [`wait`] with an explicit config. Always polls, whoever launched.
pub fn wait_with(config: &Config, name: impl AsRef<Path>) -> Result<PathBuf> {
    let fetcher = Fetcher::from_config(config);
    let target = fetcher.target(name);
    wait_for(&target.path, fetcher.config().poll_interval)?;
    Ok(target.path)
}
