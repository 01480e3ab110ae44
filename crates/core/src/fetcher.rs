//! Launch decision and completion wait.
//!
//! Coordination between callers (threads or processes) happens only through
//! two paths on disk: the target itself and its `.loading` marker. The target
//! is authoritative; once it exists every launch and wait short-circuits. The
//! marker means "someone started a download" and is never removed here.
//!
//! In [`SentinelMode::Touch`] the marker check and its creation are two
//! separate steps, so concurrent launchers can both spawn a downloader. That
//! is tolerated: waiters only care that the target eventually appears.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SentinelMode};
use crate::error::{FetchError, Result};
use crate::gate::Gate;
use crate::paths::{source_url, Target};
use crate::poll::{exists, wait_for};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub root: Option<PathBuf>,
    pub gate: Gate,
    pub poll_interval: Duration,
    pub sentinel_mode: SentinelMode,
}

impl From<&Config> for FetchConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.source.base_url.clone(),
            program: config.downloader.program.clone(),
            args: config.downloader.args.clone(),
            root: config.storage.root.clone(),
            gate: Gate::from_config(&config.gate),
            poll_interval: config.wait.poll_interval(),
            sentinel_mode: config.sentinel.mode,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Owned handle to a downloader this caller spawned.
///
/// Not `Clone`: only the context that won the launch gets the fast
/// exit-based wait. Dropping the handle leaves the process running; a
/// detached thread reaps it once it exits.
#[derive(Debug)]
pub struct DownloadHandle {
    // None only after `wait` took it
    child: Option<Child>,
    pid: u32,
    target: PathBuf,
}

impl DownloadHandle {
    fn new(child: Child, target: PathBuf) -> Self {
        Self {
            pid: child.id(),
            child: Some(child),
            target,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Block until the downloader exits.
    ///
    /// The target is not re-checked afterwards; a clean exit is taken to mean
    /// the file is in place.
    pub fn wait(mut self) -> Result<ExitStatus> {
        let Some(mut child) = self.child.take() else {
            unreachable!("download handle waited twice");
        };
        let status = child
            .wait()
            .map_err(|e| FetchError::io(&self.target, e))?;
        if status.success() {
            tracing::debug!("Downloader for {:?} finished", self.target);
        } else {
            tracing::warn!("Downloader for {:?} exited with {}", self.target, status);
        }
        Ok(status)
    }
}

impl Drop for DownloadHandle {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let target = self.target.clone();
        let reaper = std::thread::Builder::new()
            .name(format!("reap-{}", self.pid))
            .spawn(move || match child.wait() {
                Ok(status) if !status.success() => {
                    tracing::warn!("Downloader for {:?} exited with {}", target, status);
                }
                Ok(_) => tracing::debug!("Downloader for {:?} finished", target),
                Err(e) => tracing::warn!("Failed to reap downloader for {:?}: {}", target, e),
            });
        if let Err(e) = reaper {
            tracing::warn!("Could not start reaper for pid {}: {}", self.pid, e);
        }
    }
}

/// How a wait was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// This caller's own downloader exited.
    Exited(ExitStatus),
    /// The target was observed on disk.
    Present,
}

/// What the filesystem currently says about a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum FileState {
    Present,
    /// Marker without target: in progress, or failed without cleanup.
    Downloading { since: Option<DateTime<Utc>> },
    Absent,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Present => "present",
            FileState::Downloading { .. } => "downloading",
            FileState::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    config: Arc<FetchConfig>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(FetchConfig::from(config))
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn target(&self, name: impl AsRef<Path>) -> Target {
        Target::new(self.config.root.as_deref(), name)
    }

    pub fn url_for(&self, name: &Path) -> String {
        source_url(&self.config.base_url, name)
    }

    /// Start a background download of `name` unless the file exists, a
    /// marker says someone else is on it, or the gate forbids downloads.
    ///
    /// Returns the process handle only when this call spawned the downloader.
    pub fn launch(&self, name: impl AsRef<Path>) -> Result<Option<DownloadHandle>> {
        let target = self.target(name);
        let url = self.url_for(&target.name);
        self.launch_target(&target, &url)
    }

    /// [`Fetcher::launch`] with an explicit source URL.
    pub fn launch_from(
        &self,
        name: impl AsRef<Path>,
        url: &str,
    ) -> Result<Option<DownloadHandle>> {
        let target = self.target(name);
        self.launch_target(&target, url)
    }

    /// Block until `name` exists.
    ///
    /// With a handle, waits for that process to exit. Without one, and with no
    /// marker on disk, launches now and waits on the result. Otherwise polls.
    pub fn wait(
        &self,
        name: impl AsRef<Path>,
        handle: Option<DownloadHandle>,
    ) -> Result<WaitOutcome> {
        let target = self.target(name);
        let url = self.url_for(&target.name);
        self.wait_target(&target, &url, handle)
    }

    pub fn state(&self, name: impl AsRef<Path>) -> Result<FileState> {
        let target = self.target(name);
        if exists(&target.path)? {
            return Ok(FileState::Present);
        }
        match std::fs::metadata(&target.sentinel) {
            Ok(meta) => Ok(FileState::Downloading {
                since: meta.modified().ok().map(DateTime::<Utc>::from),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileState::Absent),
            Err(e) => Err(FetchError::io(&target.sentinel, e)),
        }
    }

    pub(crate) fn launch_target(
        &self,
        target: &Target,
        url: &str,
    ) -> Result<Option<DownloadHandle>> {
        if exists(&target.path)? {
            tracing::debug!("{:?} already present, nothing to launch", target.path);
            return Ok(None);
        }
        if exists(&target.sentinel)? {
            tracing::debug!("{:?} is already being downloaded", target.path);
            return Ok(None);
        }
        if !self.config.gate.allows_download() {
            tracing::debug!("Downloads disabled, not launching {:?}", target.path);
            return Ok(None);
        }
        if !self.create_sentinel(target)? {
            return Ok(None);
        }
        self.spawn(target, url).map(Some)
    }

    pub(crate) fn wait_target(
        &self,
        target: &Target,
        url: &str,
        handle: Option<DownloadHandle>,
    ) -> Result<WaitOutcome> {
        if let Some(handle) = handle {
            if handle.target() != target.path {
                return Err(FetchError::HandleMismatch {
                    expected: target.path.clone(),
                    actual: handle.target().to_path_buf(),
                });
            }
            return handle.wait().map(WaitOutcome::Exited);
        }
        if !exists(&target.sentinel)? {
            if let Some(handle) = self.launch_target(target, url)? {
                return handle.wait().map(WaitOutcome::Exited);
            }
        }
        wait_for(&target.path, self.config.poll_interval)?;
        Ok(WaitOutcome::Present)
    }

    /// Returns false when an exclusive create finds the marker already there.
    fn create_sentinel(&self, target: &Target) -> Result<bool> {
        let mut options = OpenOptions::new();
        options.write(true);
        match self.config.sentinel_mode {
            SentinelMode::Touch => options.create(true),
            SentinelMode::Exclusive => options.create_new(true),
        };

        match options.open(&target.sentinel) {
            Ok(_) => Ok(true),
            Err(e)
                if e.kind() == ErrorKind::AlreadyExists
                    && self.config.sentinel_mode == SentinelMode::Exclusive =>
            {
                tracing::debug!("Lost the race for {:?}", target.sentinel);
                Ok(false)
            }
            Err(e) => Err(FetchError::io(&target.sentinel, e)),
        }
    }

    fn spawn(&self, target: &Target, url: &str) -> Result<DownloadHandle> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(url)
            .arg(&target.name)
            .stdin(Stdio::null());
        if let Some(root) = &self.config.root {
            cmd.current_dir(root);
        }

        let child = cmd.spawn().map_err(|source| FetchError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        tracing::info!(
            pid = child.id(),
            "Downloading {} -> {:?}",
            url,
            target.path
        );

        Ok(DownloadHandle::new(child, target.path.clone()))
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(FetchConfig::default())
    }
}
