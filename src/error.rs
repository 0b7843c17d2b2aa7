use std::path::PathBuf;
use thiserror::Error;

/// The main error type for hepref operations.
#[derive(Debug, Error)]
pub enum HepRefError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML from {path}: {source}")]
    YamlParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse record metadata returned by {url}: {source}")]
    MetadataParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize output as JSON: {0}")]
    JsonWrite(#[source] serde_json::Error),

    #[error("Invalid reference \"{reference}\" (context: {context}): {message}")]
    ReferenceGrammar {
        reference: String,
        context: String,
        message: String,
    },

    #[error("Unresolvable reference type '{0}' (supported: hepdata, hepdata-sandbox, inspirehep)")]
    UnsupportedReferenceType(String),

    #[error("Invalid reference component requested: '{0}' (supported: type, id, version, resource, qualifier)")]
    UnknownComponent(String),

    #[error("Invalid archive URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP error response {status} to GET: {url}")]
    Http { url: String, status: u16 },

    #[error("Unexpected response to GET {url}. Response content-type: {content_type}, expected {expected}")]
    ContentType {
        url: String,
        content_type: String,
        expected: &'static str,
    },

    #[error("{requested_kind} recordid={recordid} doesn't seem to exist, but there is a {suggested_kind} record with that id. Try {suggested}:{recordid}")]
    NamespaceMismatch {
        recordid: String,
        requested_kind: &'static str,
        suggested_kind: &'static str,
        suggested: &'static str,
    },

    #[error("Archive format error: {0}")]
    ArchiveFormat(String),

    #[error("Failed to extract archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Requested version {requested} of record {recordid}, but the record reported that the latest version is {latest}")]
    VersionConflict {
        recordid: String,
        requested: u64,
        latest: u64,
    },

    #[error("Failed to resolve reference {reference} to a file in {record_path}: is the resource name '{resource}' correct? Directory contents: [{}]", .contents.join(", "))]
    ResourceNotFound {
        reference: String,
        resource: String,
        record_path: PathBuf,
        contents: Vec<String>,
    },

    #[error("Invalid qualifiers on dependent variable '{variable}': {message}")]
    QualifierValidation { variable: String, message: String },

    #[error("Malformed table {source_path}: {message}")]
    MalformedTable {
        source_path: PathBuf,
        message: String,
    },

    #[error("Failed to resolve sub_measurement reference \"{reference}\" to a dependent variable on another table")]
    SubReferenceResolution { reference: String },

    #[error("Reference cycle detected while resolving {reference} (resolution chain: {})", .chain.join(" -> "))]
    CycleDetected {
        reference: String,
        chain: Vec<String>,
    },

    #[error("No record database configured: pass --nuisancedb or set NUISANCEDB")]
    CacheRootUnset,

    #[error("Record database root directory {0} does not exist. If this location is where you intend the database to be, please make the directory.")]
    CacheRootMissing(PathBuf),

    #[error("Failed to find qualifier with key '{key}' on {reference}")]
    QualifierNotFound { reference: String, key: String },
}
