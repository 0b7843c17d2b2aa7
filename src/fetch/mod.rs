//! Guarantee that a referenced resource exists in the local cache.
//!
//! A resolution first probes the cache. On a miss it asks the archive for
//! the record's latest version, downloads and extracts the submission
//! archive for the negotiated version, and probes again. Populated record
//! directories are authoritative and never revalidated.

mod archive;
pub mod transport;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{self, Namespace};
use crate::config::ResolverConfig;
use crate::error::HepRefError;
use crate::reference::{parse_reference, PartialReference, RawReference, ReferenceComponents};

pub use transport::{HttpResponse, ResponseHead, Transport, UreqTransport};

const JSON_MEDIA_TYPE: &str = "application/json";
const ZIP_MEDIA_TYPE: &str = "application/zip";

/// Local paths of a resolved reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedResource {
    /// Versioned record directory.
    pub record_path: PathBuf,
    /// The resource file, or the record directory when no resource was named.
    pub resource_path: PathBuf,
    /// Input components with the record version filled in.
    pub components: ReferenceComponents,
}

/// Resolves references against the local cache, fetching records on a miss.
pub struct ResourceFetcher<T = UreqTransport> {
    config: ResolverConfig,
    transport: T,
}

impl ResourceFetcher<UreqTransport> {
    /// Fetcher using the default HTTP transport.
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> ResourceFetcher<T> {
    pub fn with_transport(config: ResolverConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Parse `reference` against `context` and resolve it.
    pub fn resolve_reference<'a>(
        &self,
        reference: impl Into<RawReference<'a>>,
        context: &PartialReference,
    ) -> Result<ResolvedResource, HepRefError> {
        let components = parse_reference(reference, context)?;
        self.resolve(&components)
    }

    /// Ensure the resource named by `components` exists locally.
    ///
    /// # Errors
    /// Fails on unsupported reference types, HTTP failures (with a
    /// namespace hint when the record exists in the other namespace),
    /// malformed metadata, version conflicts, archive failures, and
    /// resources missing from the extracted record.
    pub fn resolve(
        &self,
        components: &ReferenceComponents,
    ) -> Result<ResolvedResource, HepRefError> {
        let namespace = Namespace::from_reftype(&components.reftype)?;
        let record_path = cache::record_location(&self.config.cache_root, components)?;

        debug!(
            reference = %components,
            record_path = %record_path.display(),
            "resolving reference"
        );

        if let Some(resource_path) =
            cache::probe_resource(&record_path, components.resourcename.as_deref())
        {
            debug!(resource_path = %resource_path.display(), "cache hit");
            return Ok(ResolvedResource {
                record_path,
                resource_path,
                components: components.clone(),
            });
        }

        if namespace == Namespace::Inspire {
            // INSPIRE-HEP records are provisioned by hand and never fetched.
            return Err(resource_not_found(components, &record_path));
        }

        let latest = self.fetch_latest_version(namespace, components)?;
        let version = match components.recordversion.as_deref() {
            None => latest,
            Some(requested) => {
                let requested = parse_version(requested, components)?;
                if requested > latest {
                    return Err(HepRefError::VersionConflict {
                        recordid: components.recordid.clone(),
                        requested,
                        latest,
                    });
                }
                requested
            }
        };

        let normalized = components.with_version(version.to_string());
        let record_path = cache::record_location(&self.config.cache_root, &normalized)?;

        if cache::is_populated(&record_path) {
            debug!(record_path = %record_path.display(), "record already cached at negotiated version");
        } else {
            self.populate_record(&normalized, version, &record_path)?;
        }

        match cache::probe_resource(&record_path, normalized.resourcename.as_deref()) {
            Some(resource_path) => {
                debug!(resource_path = %resource_path.display(), "resolved");
                Ok(ResolvedResource {
                    record_path,
                    resource_path,
                    components: normalized,
                })
            }
            None => Err(resource_not_found(&normalized, &record_path)),
        }
    }

    /// Ask the archive for the latest version of a record.
    fn fetch_latest_version(
        &self,
        namespace: Namespace,
        components: &ReferenceComponents,
    ) -> Result<u64, HepRefError> {
        let url = self
            .config
            .endpoints
            .record_metadata(namespace, &components.recordid)?;

        info!(%url, "fetching record metadata");
        let response = self.transport.get(&url)?;
        let head = &response.head;
        debug!(%url, status = head.status, content_type = ?head.content_type, "metadata response");

        if !head.is_success() {
            if let Some(hint) = self.probe_counterpart(namespace, &components.recordid) {
                return Err(hint);
            }
            return Err(HepRefError::Http {
                url: url.to_string(),
                status: head.status,
            });
        }

        if !head.has_media_type(JSON_MEDIA_TYPE) {
            if let Some(hint) = self.probe_counterpart(namespace, &components.recordid) {
                return Err(hint);
            }
            return Err(HepRefError::ContentType {
                url: url.to_string(),
                content_type: head.content_type.clone().unwrap_or_default(),
                expected: JSON_MEDIA_TYPE,
            });
        }

        let metadata: Value =
            serde_json::from_slice(&response.body).map_err(|source| HepRefError::MetadataParse {
                url: url.to_string(),
                source,
            })?;

        metadata_version(&metadata).ok_or_else(|| {
            HepRefError::ArchiveFormat(format!(
                "response to GET {url} does not look like a submission object: no usable 'version' field"
            ))
        })
    }

    /// Check whether the record exists in the other HEPData namespace.
    ///
    /// Only ever used to improve an error message; any failure of the probe
    /// itself is swallowed.
    fn probe_counterpart(&self, namespace: Namespace, recordid: &str) -> Option<HepRefError> {
        let other = namespace.counterpart()?;
        let url = self.config.endpoints.record_metadata(other, recordid).ok()?;

        debug!(%url, "probing other namespace");
        match self.transport.get(&url) {
            Ok(response) if response.head.is_success_with(JSON_MEDIA_TYPE) => {
                warn!(recordid, suggested = other.reftype(), "record found in other namespace");
                Some(HepRefError::NamespaceMismatch {
                    recordid: recordid.to_string(),
                    requested_kind: namespace.describe(),
                    suggested_kind: other.describe(),
                    suggested: other.reftype(),
                })
            }
            Ok(_) => None,
            Err(err) => {
                debug!(%url, error = %err, "namespace probe failed");
                None
            }
        }
    }

    /// Download and extract the archive for one record version.
    fn populate_record(
        &self,
        components: &ReferenceComponents,
        version: u64,
        record_path: &Path,
    ) -> Result<(), HepRefError> {
        if let Some(record_root) = record_path.parent() {
            if !record_root.exists() {
                info!(path = %record_root.display(), "making local record directory");
                fs::create_dir_all(record_root).map_err(|source| HepRefError::Write {
                    path: record_root.to_path_buf(),
                    source,
                })?;
            }
        }

        let archive_path = cache::archive_path(record_path);
        if archive_path.exists() {
            debug!(archive = %archive_path.display(), "reusing previously downloaded archive");
        } else {
            self.download_archive(components, version, &archive_path)?;
        }

        if !archive_path.is_file() {
            return Err(HepRefError::ArchiveFormat(format!(
                "expected {} to exist after downloading",
                archive_path.display()
            )));
        }

        archive::extract_archive(&archive_path, record_path)?;
        fs::remove_file(&archive_path).map_err(|source| HepRefError::Write {
            path: archive_path.clone(),
            source,
        })?;
        info!(record_path = %record_path.display(), "record extracted");
        Ok(())
    }

    /// Stream the submission archive to `archive_path`.
    ///
    /// The body goes to a temporary file that only replaces `archive_path`
    /// once the response has been checked.
    fn download_archive(
        &self,
        components: &ReferenceComponents,
        version: u64,
        archive_path: &Path,
    ) -> Result<(), HepRefError> {
        let url = self
            .config
            .endpoints
            .submission_archive(&components.recordid, version)?;

        info!(%url, destination = %archive_path.display(), "downloading submission archive");
        let mut staged = archive::staging_file(archive_path)?;
        let head = self.transport.get_to_writer(&url, &mut staged)?;
        debug!(%url, status = head.status, content_type = ?head.content_type, "archive response");

        if !head.is_success() {
            return Err(HepRefError::Http {
                url: url.to_string(),
                status: head.status,
            });
        }
        if !head.has_media_type(ZIP_MEDIA_TYPE) {
            return Err(HepRefError::ContentType {
                url: url.to_string(),
                content_type: head.content_type.unwrap_or_default(),
                expected: ZIP_MEDIA_TYPE,
            });
        }

        archive::persist_staged(staged, archive_path)
    }
}

/// The `version` field of a metadata document, as a number or numeric string.
fn metadata_version(metadata: &Value) -> Option<u64> {
    match metadata.get("version")? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_version(requested: &str, components: &ReferenceComponents) -> Result<u64, HepRefError> {
    requested
        .parse()
        .map_err(|_| HepRefError::ReferenceGrammar {
            reference: components.to_string(),
            context: String::from("{}"),
            message: format!("record version '{requested}' is not a number"),
        })
}

fn resource_not_found(
    components: &ReferenceComponents,
    record_path: &Path,
) -> HepRefError {
    HepRefError::ResourceNotFound {
        reference: components.to_string(),
        resource: components
            .resourcename
            .clone()
            .unwrap_or_else(|| cache::MANIFEST_FILE_NAME.to_string()),
        record_path: record_path.to_path_buf(),
        contents: cache::list_contents(record_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_may_be_number_or_string() {
        assert_eq!(metadata_version(&serde_json::json!({"version": 3})), Some(3));
        assert_eq!(metadata_version(&serde_json::json!({"version": "2"})), Some(2));
        assert_eq!(metadata_version(&serde_json::json!({"record": {}})), None);
        assert_eq!(metadata_version(&serde_json::json!({"version": null})), None);
    }

    #[test]
    fn non_numeric_requested_version_is_grammar_error() {
        let components = ReferenceComponents {
            reftype: "hepdata".into(),
            recordid: "1".into(),
            recordversion: Some("latest".into()),
            resourcename: None,
            qualifier: None,
        };
        assert!(matches!(
            parse_version("latest", &components),
            Err(HepRefError::ReferenceGrammar { .. })
        ));
    }
}
