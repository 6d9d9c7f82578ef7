//! Resource locations: remote URLs or local filesystem paths.
//!
//! Manifest entries reference their files relative to the manifest itself,
//! so `Location::join` resolves a reference against the directory the
//! manifest was loaded from.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Url;

use crate::error::{PipelineError, Result};

/// Where a text resource lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Url(Url),
    Path(PathBuf),
}

impl Location {
    /// Parse a user supplied location. Anything with an `http://` or
    /// `https://` scheme is a URL, everything else is a path.
    pub fn parse(raw: &str) -> Result<Self> {
        if is_remote(raw) {
            let url = Url::parse(raw).map_err(|e| {
                PipelineError::ResourceUnavailable {
                    location: Location::Path(PathBuf::from(raw)),
                    reason: format!("invalid URL: {e}"),
                }
            })?;
            Ok(Location::Url(url))
        } else {
            Ok(Location::Path(PathBuf::from(raw)))
        }
    }

    /// Resolve `reference` relative to this location.
    pub fn join(&self, reference: &str) -> Result<Self> {
        if is_remote(reference) {
            return Location::parse(reference);
        }
        match self {
            Location::Url(base) => base.join(reference).map(Location::Url).map_err(|e| {
                PipelineError::unavailable(self, format!("cannot join {reference:?}: {e}"))
            }),
            Location::Path(base) => {
                let reference = Path::new(reference);
                if reference.is_absolute() {
                    return Ok(Location::Path(reference.to_path_buf()));
                }
                let dir = base.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::Path(dir.join(reference)))
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }
}

fn is_remote(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Url(url) => write!(f, "{url}"),
            Location::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl serde::Serialize for Location {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
