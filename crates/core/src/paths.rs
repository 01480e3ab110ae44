//! Naming rules shared by every participant: the marker path next to a
//! target and the remote locator a target is fetched from.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Appended to the target path to name its download-in-progress marker.
pub const MARKER_SUFFIX: &str = ".loading";

/// `model.ckpt` -> `model.ckpt.loading`. The original extension is kept.
pub fn sentinel_path(target: &Path) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(MARKER_SUFFIX);
    PathBuf::from(name)
}

/// Plain concatenation of the base URL and the target name, no escaping.
pub fn source_url(base_url: &str, name: &Path) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        name.to_string_lossy()
    )
}

/// A file this process may download or wait on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Name as the caller gave it; passed verbatim to the downloader.
    pub name: PathBuf,
    /// Name resolved against the storage root.
    pub path: PathBuf,
    /// Marker path derived from `path`.
    pub sentinel: PathBuf,
}

impl Target {
    pub fn new(root: Option<&Path>, name: impl AsRef<Path>) -> Self {
        let name = name.as_ref().to_path_buf();
        // Path::join keeps absolute names untouched
        let path = match root {
            Some(root) => root.join(&name),
            None => name.clone(),
        };
        let sentinel = sentinel_path(&path);
        Self {
            name,
            path,
            sentinel,
        }
    }
}
