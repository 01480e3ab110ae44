//! Batch launch lists.
//!
//! One entry per line, fields separated by whitespace:
//!
//! ```text
//! https://example.com/sd/unet.bin     sd/unet.bin
//! sd/vae.bin
//! ```
//!
//! A single field is a target name fetched from the configured base URL.
//! Blank lines are ignored.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::Result;
use crate::fetcher::{DownloadHandle, Fetcher};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected `<url> <dest>` or `<dest>`, got `{content}`")]
    InvalidLine { line: usize, content: String },

    #[error("line {line}: duplicate entry {dest:?}")]
    DuplicateEntry { line: usize, dest: PathBuf },

    #[error(
        "line {line}: duplicate destination {dest:?} with different urls: {first} and {second}"
    )]
    ConflictingSource {
        line: usize,
        dest: PathBuf,
        first: String,
        second: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub dest: PathBuf,
    /// Explicit source; `None` means derive from the base URL.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let read_err = |source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = std::fs::File::open(path).map_err(read_err)?;
        Self::parse(std::io::BufReader::new(file)).map_err(|e| match e {
            ManifestError::Read { source, .. } => read_err(source),
            other => other,
        })
    }

    pub fn parse(reader: impl BufRead) -> Result<Self, ManifestError> {
        let mut entries = Vec::new();
        // dest -> the url it was first listed with (or "" when derived)
        let mut seen: HashMap<PathBuf, String> = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|source| ManifestError::Read {
                path: PathBuf::new(),
                source,
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            let entry = match fields.as_slice() {
                [dest] => ManifestEntry {
                    dest: PathBuf::from(dest),
                    url: None,
                },
                [url, dest] => ManifestEntry {
                    dest: PathBuf::from(dest),
                    url: Some(url.to_string()),
                },
                _ => {
                    return Err(ManifestError::InvalidLine {
                        line: line_no,
                        content: line.to_string(),
                    })
                }
            };

            let url_key = entry.url.clone().unwrap_or_default();
            if let Some(first) = seen.get(&entry.dest) {
                if *first == url_key {
                    return Err(ManifestError::DuplicateEntry {
                        line: line_no,
                        dest: entry.dest,
                    });
                }
                return Err(ManifestError::ConflictingSource {
                    line: line_no,
                    dest: entry.dest,
                    first: first.clone(),
                    second: url_key,
                });
            }
            seen.insert(entry.dest.clone(), url_key);
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the launch decision for every entry, in order. Stops at the first
    /// error; handles for downloads already started are dropped (the
    /// processes keep running).
    pub fn launch_all(&self, fetcher: &Fetcher) -> Result<Vec<DownloadHandle>> {
        let mut handles = Vec::new();
        for entry in &self.entries {
            let handle = match &entry.url {
                Some(url) => fetcher.launch_from(&entry.dest, url)?,
                None => fetcher.launch(&entry.dest)?,
            };
            handles.extend(handle);
        }
        tracing::info!(
            "Launched {} of {} manifest entries",
            handles.len(),
            self.entries.len()
        );
        Ok(handles)
    }
}
