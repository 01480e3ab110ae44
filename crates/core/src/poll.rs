//! Existence polling. The only wait available to callers that do not own
//! the downloader process.

use std::path::Path;
use std::time::Duration;

use crate::error::{FetchError, Result};

/// Default polling interval between existence checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) fn exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(|e| FetchError::io(path, e))
}

/// Block the calling thread until `path` exists. No timeout.
pub fn wait_for(path: &Path, interval: Duration) -> Result<()> {
    let mut polls: u64 = 0;
    while !exists(path)? {
        if polls == 0 {
            tracing::debug!("Waiting for {:?}", path);
        }
        polls += 1;
        std::thread::sleep(interval);
    }
    tracing::debug!("{:?} is present after {} poll(s)", path, polls);
    Ok(())
}

/// Same as [`wait_for`], sleeping on the tokio timer instead of the thread.
pub async fn wait_for_async(path: &Path, interval: Duration) -> Result<()> {
    loop {
        let present = tokio::fs::try_exists(path)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        if present {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}
