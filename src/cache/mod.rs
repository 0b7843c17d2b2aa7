//! On-disk layout of the local record cache.
//!
//! Records live at `<root>/<reftype>/<recordid>/HEPData-<recordid>-v<version>/`
//! with the extracted `submission.yaml` and its data files side by side. This
//! layout is shared with other tools reading the same cache and must not
//! change.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::HepRefError;
use crate::reference::{ReferenceComponents, HEPDATA, HEPDATA_SANDBOX, INSPIREHEP};

/// File name of the manifest at the top of every extracted record.
pub const MANIFEST_FILE_NAME: &str = "submission.yaml";

/// Directory name used for locally provisioned INSPIRE-HEP records.
const INSPIRE_DIR_NAME: &str = "INSPIREHEP";

/// Namespace a reference type maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    /// Published HEPData records.
    Public,
    /// HEPData sandbox submissions.
    Sandbox,
    /// INSPIRE-HEP records, which are only ever read from the local cache.
    Inspire,
}

impl Namespace {
    /// Map a reference type onto its namespace.
    pub fn from_reftype(reftype: &str) -> Result<Self, HepRefError> {
        match reftype {
            HEPDATA => Ok(Namespace::Public),
            HEPDATA_SANDBOX => Ok(Namespace::Sandbox),
            INSPIREHEP => Ok(Namespace::Inspire),
            other => Err(HepRefError::UnsupportedReferenceType(other.to_string())),
        }
    }

    /// The reference type naming this namespace.
    pub fn reftype(self) -> &'static str {
        match self {
            Namespace::Public => HEPDATA,
            Namespace::Sandbox => HEPDATA_SANDBOX,
            Namespace::Inspire => INSPIREHEP,
        }
    }

    /// The other HEPData namespace, used for misplaced-record diagnostics.
    pub fn counterpart(self) -> Option<Self> {
        match self {
            Namespace::Public => Some(Namespace::Sandbox),
            Namespace::Sandbox => Some(Namespace::Public),
            Namespace::Inspire => None,
        }
    }

    /// Human-readable kind of record held in this namespace.
    pub fn describe(self) -> &'static str {
        match self {
            Namespace::Public => "Normal HEPData",
            Namespace::Sandbox => "Sandbox HEPData",
            Namespace::Inspire => "INSPIRE-HEP",
        }
    }
}

/// Path of the record directory below a namespace root.
///
/// `root` is `<cache_root>/<reftype>`. An unset version yields a directory
/// name with an empty version suffix, which never exists in a populated cache.
pub fn record_path(root: &Path, recordid: &str, recordversion: Option<&str>) -> PathBuf {
    root.join(recordid).join(format!(
        "HEPData-{recordid}-v{}",
        recordversion.unwrap_or_default()
    ))
}

/// Root of a namespace inside the cache.
pub fn namespace_root(cache_root: &Path, namespace: Namespace) -> PathBuf {
    match namespace {
        Namespace::Inspire => cache_root.join(INSPIRE_DIR_NAME),
        other => cache_root.join(other.reftype()),
    }
}

/// Record directory for a set of components.
pub fn record_location(
    cache_root: &Path,
    components: &ReferenceComponents,
) -> Result<PathBuf, HepRefError> {
    let namespace = Namespace::from_reftype(&components.reftype)?;
    let root = namespace_root(cache_root, namespace);
    Ok(match namespace {
        Namespace::Inspire => root
            .join(&components.recordid)
            .join(format!("submission-{}", components.recordid)),
        _ => record_path(
            &root,
            &components.recordid,
            components.recordversion.as_deref(),
        ),
    })
}

/// Path the downloaded archive is staged at before extraction.
pub fn archive_path(record_dir: &Path) -> PathBuf {
    let mut staged = record_dir.as_os_str().to_owned();
    staged.push(".zip");
    PathBuf::from(staged)
}

/// Locate a resource inside a record directory.
///
/// The raw resource name is tried first, then the name with a `.yaml`
/// suffix. Without a resource name the record directory itself is the
/// resource, provided it holds a manifest.
pub fn probe_resource(record_dir: &Path, resourcename: Option<&str>) -> Option<PathBuf> {
    match resourcename {
        Some(name) => {
            let raw = record_dir.join(name);
            if raw.exists() {
                return Some(raw);
            }
            let yaml = record_dir.join(format!("{name}.yaml"));
            yaml.exists().then_some(yaml)
        }
        None => record_dir
            .join(MANIFEST_FILE_NAME)
            .is_file()
            .then(|| record_dir.to_path_buf()),
    }
}

/// Whether a record directory has been fully populated.
pub fn is_populated(record_dir: &Path) -> bool {
    record_dir.join(MANIFEST_FILE_NAME).is_file()
}

/// File names directly inside a record directory, for diagnostics.
pub fn list_contents(record_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(record_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn components(reftype: &str, version: Option<&str>) -> ReferenceComponents {
        ReferenceComponents {
            reftype: reftype.to_string(),
            recordid: "12345".to_string(),
            recordversion: version.map(str::to_string),
            resourcename: None,
            qualifier: None,
        }
    }

    #[test]
    fn record_layout_is_canonical() {
        let path = record_location(Path::new("/db"), &components("hepdata", Some("2")))
            .expect("location");
        assert_eq!(path, PathBuf::from("/db/hepdata/12345/HEPData-12345-v2"));

        let sandbox = record_location(Path::new("/db"), &components("hepdata-sandbox", Some("1")))
            .expect("location");
        assert_eq!(
            sandbox,
            PathBuf::from("/db/hepdata-sandbox/12345/HEPData-12345-v1")
        );
    }

    #[test]
    fn inspire_layout() {
        let path =
            record_location(Path::new("/db"), &components("inspirehep", None)).expect("location");
        assert_eq!(path, PathBuf::from("/db/INSPIREHEP/12345/submission-12345"));
    }

    #[test]
    fn unknown_reftype_is_rejected() {
        let err = record_location(Path::new("/db"), &components("arxiv", None)).expect_err("fail");
        assert!(matches!(err, HepRefError::UnsupportedReferenceType(t) if t == "arxiv"));
    }

    #[test]
    fn archive_is_staged_beside_record_dir() {
        let staged = archive_path(Path::new("/db/hepdata/1/HEPData-1-v1"));
        assert_eq!(staged, PathBuf::from("/db/hepdata/1/HEPData-1-v1.zip"));
    }

    #[test]
    fn resource_lookup_prefers_raw_name_then_yaml_suffix() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dir = temp.path();
        fs::write(dir.join("Table1.yaml"), "a: 1").expect("write");
        fs::write(dir.join("Flux"), "a: 1").expect("write");
        fs::write(dir.join("Flux.yaml"), "a: 1").expect("write");

        assert_eq!(probe_resource(dir, Some("Table1")), Some(dir.join("Table1.yaml")));
        assert_eq!(probe_resource(dir, Some("Flux")), Some(dir.join("Flux")));
        assert_eq!(probe_resource(dir, Some("Missing")), None);
    }

    #[test]
    fn record_dir_is_resource_only_when_populated() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dir = temp.path();
        assert_eq!(probe_resource(dir, None), None);
        fs::write(dir.join(MANIFEST_FILE_NAME), "---\n").expect("write");
        assert_eq!(probe_resource(dir, None), Some(dir.to_path_buf()));
        assert!(is_populated(dir));
    }
}
