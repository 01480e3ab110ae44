use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where artifacts are fetched from
    #[serde(default)]
    pub source: SourceConfig,

    /// External download utility
    #[serde(default)]
    pub downloader: DownloaderConfig,

    /// Local storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Environment gate for downloads
    #[serde(default)]
    pub gate: GateConfig,

    /// Wait settings
    #[serde(default)]
    pub wait: WaitConfig,

    /// Download-in-progress marker settings
    #[serde(default)]
    pub sentinel: SentinelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL the target name is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Downloader executable
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Extra arguments placed before the source URL and destination
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory relative target names resolve against (default: current directory)
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Environment variable that forces downloads on when set
    #[serde(default = "default_override_var")]
    pub override_var: String,

    /// Marker file whose presence disables downloads (container builds)
    #[serde(default = "default_sandbox_marker")]
    pub sandbox_marker: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Filesystem polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub mode: SentinelMode,
}

/// How the download-in-progress marker is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentinelMode {
    /// Check, then touch. Two callers racing on the same target may both spawn.
    #[default]
    Touch,
    /// Create-new. Only the caller that actually creates the marker spawns.
    Exclusive,
}

impl SentinelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentinelMode::Touch => "touch",
            SentinelMode::Exclusive => "exclusive",
        }
    }
}

impl std::str::FromStr for SentinelMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "touch" => Ok(SentinelMode::Touch),
            "exclusive" => Ok(SentinelMode::Exclusive),
            other => anyhow::bail!(
                "Unknown sentinel mode: {} (expected touch or exclusive)",
                other
            ),
        }
    }
}

fn default_base_url() -> String {
    "https://weights.replicate.delivery".to_string()
}

fn default_program() -> PathBuf {
    PathBuf::from("/usr/bin/pget")
}

fn default_override_var() -> String {
    "PGET".to_string()
}

fn default_sandbox_marker() -> PathBuf {
    PathBuf::from("/.dockerenv")
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            override_var: default_override_var(),
            sandbox_marker: default_sandbox_marker(),
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WaitConfig {
    /// Clamped to at least 1ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Config {
    /// Get the base directory: ~/.config/lazyweights/
    pub fn base_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("USERPROFILE").map(PathBuf::from))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(home.join(".config").join("lazyweights"))
    }

    /// Load config from default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from an explicit path, falling back to defaults when it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the config file path: ~/.config/lazyweights/config.toml
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.toml"))
    }
}
