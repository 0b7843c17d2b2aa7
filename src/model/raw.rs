//! Raw HEPData submission documents as they appear on disk.
//!
//! These types mirror the YAML schema loosely and accept anything the
//! archive emits; all validation happens when they are converted into the
//! typed model.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value;

use crate::error::HepRefError;

// ============================================================================
// Manifest (submission.yaml)
// ============================================================================

/// One document of the multi-document manifest.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubmissionDocument {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub data_file: Option<String>,

    #[serde(default)]
    pub additional_resources: Vec<AdditionalResource>,
}

/// An auxiliary file attached to a record or table.
#[derive(Clone, Debug, Deserialize)]
pub struct AdditionalResource {
    pub location: String,

    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Data files
// ============================================================================

/// One table document of a data file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub independent_variables: Vec<RawVariable>,

    #[serde(default)]
    pub dependent_variables: Vec<RawDependentVariable>,
}

/// Column header shared by both variable kinds.
#[derive(Clone, Debug, Deserialize)]
pub struct RawHeader {
    pub name: String,

    #[serde(default)]
    pub units: Option<Value>,
}

/// An independent variable (binning axis).
#[derive(Clone, Debug, Deserialize)]
pub struct RawVariable {
    pub header: RawHeader,

    #[serde(default)]
    pub values: Vec<RawValue>,
}

/// A dependent variable with its qualifiers.
#[derive(Clone, Debug, Deserialize)]
pub struct RawDependentVariable {
    pub header: RawHeader,

    #[serde(default)]
    pub qualifiers: Vec<RawQualifier>,

    #[serde(default)]
    pub values: Vec<RawValue>,
}

/// A `name: value` annotation on a dependent variable.
#[derive(Clone, Debug, Deserialize)]
pub struct RawQualifier {
    pub name: String,

    #[serde(default)]
    pub value: Value,
}

/// One entry of a variable's `values` list: a point, or a bin with edges.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawValue {
    #[serde(default)]
    pub value: Option<Value>,

    #[serde(default)]
    pub low: Option<Value>,

    #[serde(default)]
    pub high: Option<Value>,

    #[serde(default)]
    pub errors: Vec<RawError>,
}

/// One uncertainty attached to a value.
#[derive(Clone, Debug, Deserialize)]
pub struct RawError {
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub symerror: Option<Value>,

    #[serde(default)]
    pub asymerror: Option<RawAsymError>,
}

/// Asymmetric uncertainty.
#[derive(Clone, Debug, Deserialize)]
pub struct RawAsymError {
    pub plus: Value,
    pub minus: Value,
}

impl RawHeader {
    /// Units rendered as text, if any.
    pub fn units_text(&self) -> Option<String> {
        self.units
            .as_ref()
            .map(scalar_text)
            .filter(|units| !units.is_empty())
    }
}

impl RawDependentVariable {
    /// The value of a qualifier, rendered as text.
    pub fn qualifier(&self, name: &str) -> Option<String> {
        self.qualifiers
            .iter()
            .rev()
            .find(|qualifier| qualifier.name == name)
            .map(|qualifier| scalar_text(&qualifier.value))
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Read every non-empty document of a multi-document YAML file.
pub fn read_documents<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, HepRefError> {
    let text = fs::read_to_string(path).map_err(|source| HepRefError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    documents_from_str(&text).map_err(|source| HepRefError::YamlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse every non-empty document of a multi-document YAML string.
///
/// Useful for testing without file I/O.
pub fn documents_from_str<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, serde_yaml::Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        documents.push(serde_yaml::from_value(value)?);
    }
    Ok(documents)
}

/// Read the first table document of a data file.
pub fn read_table(path: &Path) -> Result<RawTable, HepRefError> {
    read_documents::<RawTable>(path)?
        .into_iter()
        .next()
        .ok_or_else(|| HepRefError::MalformedTable {
            source_path: path.to_path_buf(),
            message: "file contains no table document".to_string(),
        })
}

/// Render a scalar YAML value as text; qualifier values are free-form.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Interpret a scalar YAML value as a number.
pub fn scalar_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
