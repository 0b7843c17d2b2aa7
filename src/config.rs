//! Resolver configuration.
//!
//! Every entry point takes a [`ResolverConfig`] explicitly; there is no
//! process-wide default cache root.

use std::path::{Path, PathBuf};

use url::Url;

use crate::cache::Namespace;
use crate::error::HepRefError;

/// Default host of the remote archive.
pub const DEFAULT_ARCHIVE_URL: &str = "https://www.hepdata.net/";

/// URL templates of the remote archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEndpoints {
    base: Url,
}

impl ArchiveEndpoints {
    /// Endpoints rooted at `base` (for example `https://www.hepdata.net/`).
    pub fn new(base: &str) -> Result<Self, HepRefError> {
        // A base without a trailing slash would have its last segment replaced by `join`.
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&normalized).map_err(|source| HepRefError::InvalidUrl {
            url: base.to_string(),
            source,
        })?;
        Ok(Self { base })
    }

    /// The base URL the other endpoints are built from.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Metadata endpoint for a record, requesting the JSON representation.
    pub fn record_metadata(&self, namespace: Namespace, recordid: &str) -> Result<Url, HepRefError> {
        let path = match namespace {
            Namespace::Sandbox => format!("record/sandbox/{recordid}"),
            _ => format!("record/{recordid}"),
        };
        let mut url = self.join(&path)?;
        url.query_pairs_mut().append_pair("format", "json");
        Ok(url)
    }

    /// Download endpoint for the original submission archive of one version.
    pub fn submission_archive(&self, recordid: &str, version: u64) -> Result<Url, HepRefError> {
        self.join(&format!("download/submission/{recordid}/{version}/original"))
    }

    fn join(&self, path: &str) -> Result<Url, HepRefError> {
        self.base.join(path).map_err(|source| HepRefError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            source,
        })
    }
}

impl Default for ArchiveEndpoints {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_ARCHIVE_URL).expect("default archive URL is valid"),
        }
    }
}

/// Configuration threaded into the fetcher and model builder.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Root of the local record cache. Must exist.
    pub cache_root: PathBuf,
    /// Remote archive endpoints.
    pub endpoints: ArchiveEndpoints,
}

impl ResolverConfig {
    /// Configuration for `cache_root` against the public archive host.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            endpoints: ArchiveEndpoints::default(),
        }
    }

    /// Replace the archive endpoints.
    pub fn with_endpoints(mut self, endpoints: ArchiveEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Check that the cache root exists.
    pub fn validate(&self) -> Result<(), HepRefError> {
        if self.cache_root.is_dir() {
            Ok(())
        } else {
            Err(HepRefError::CacheRootMissing(self.cache_root.clone()))
        }
    }

    /// Root of the local record cache.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }
}

/// Expand a leading `~` in a cache root using `HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_urls_per_namespace() {
        let endpoints = ArchiveEndpoints::default();
        assert_eq!(
            endpoints
                .record_metadata(Namespace::Public, "12345")
                .expect("url")
                .as_str(),
            "https://www.hepdata.net/record/12345?format=json"
        );
        assert_eq!(
            endpoints
                .record_metadata(Namespace::Sandbox, "12345")
                .expect("url")
                .as_str(),
            "https://www.hepdata.net/record/sandbox/12345?format=json"
        );
    }

    #[test]
    fn archive_url() {
        let endpoints = ArchiveEndpoints::new("http://mirror.example/hepdata").expect("endpoints");
        assert_eq!(
            endpoints.submission_archive("12345", 2).expect("url").as_str(),
            "http://mirror.example/hepdata/download/submission/12345/2/original"
        );
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(matches!(
            ArchiveEndpoints::new("not a url"),
            Err(HepRefError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn missing_cache_root_fails_validation() {
        let config = ResolverConfig::new("/definitely/not/a/real/cache/root");
        assert!(matches!(
            config.validate(),
            Err(HepRefError::CacheRootMissing(_))
        ));
    }

    #[test]
    fn paths_without_tilde_are_unchanged() {
        assert_eq!(expand_home(Path::new("/db")), PathBuf::from("/db"));
    }
}
