//! Typed measurement model built from an extracted HEPData record.
//!
//! A [`MeasurementRecord`] owns its tables, a table owns its dependent
//! variables, and a cross-section variable owns its flux table. Composite
//! variables share their sub-measurements, which belong to tables of other
//! records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;

use super::qualifiers::{
    CrossSectionUnits, ErrorType, MeasurementType, QualifierMap, TestStatistic,
};
use crate::reference::ReferenceComponents;

/// One extracted record.
#[derive(Clone, Debug, Serialize)]
pub struct MeasurementRecord {
    /// Normalized components the record was resolved from.
    pub components: ReferenceComponents,

    /// Versioned record directory.
    pub record_path: PathBuf,

    /// Measurement tables in manifest order.
    pub tables: Vec<MeasurementTable>,

    /// Auxiliary resource locations exactly as the manifest declares them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_resources: Vec<String>,
}

impl MeasurementRecord {
    /// Look a table up by its manifest name.
    pub fn table(&self, name: &str) -> Option<&MeasurementTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|table| table.name.as_str())
    }

    /// Auxiliary resources that are present in the record directory.
    pub fn existing_additional_resources(&self) -> Vec<PathBuf> {
        self.additional_resources
            .iter()
            .map(|location| self.record_path.join(location))
            .filter(|path| path.exists())
            .collect()
    }
}

/// A data file table holding at least one measurement.
#[derive(Clone, Debug, Serialize)]
pub struct MeasurementTable {
    pub name: String,
    pub source: PathBuf,
    pub independent_variables: Vec<IndependentVariable>,
    pub dependent_variables: Vec<DependentVariable>,
}

impl MeasurementTable {
    pub fn dependent_variable(&self, name: &str) -> Option<&DependentVariable> {
        self.dependent_variables
            .iter()
            .find(|variable| variable.name == name)
    }

    pub fn independent_variable(&self, name: &str) -> Option<&IndependentVariable> {
        self.independent_variables
            .iter()
            .find(|variable| variable.name == name)
    }
}

/// A binning axis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IndependentVariable {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    pub values: Vec<BinValue>,
}

impl IndependentVariable {
    /// Bin edges, if every value is a `low`/`high` bin.
    pub fn bin_edges(&self) -> Option<Vec<(f64, f64)>> {
        self.values
            .iter()
            .map(|value| match value {
                BinValue::Bin { low, high } => Some((*low, *high)),
                _ => None,
            })
            .collect()
    }
}

/// One entry of an independent variable.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BinValue {
    Bin { low: f64, high: f64 },
    Point(f64),
    Label(String),
}

/// One entry of a dependent variable. A missing value (`-`) has no central value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataPoint {
    pub value: Option<f64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uncertainties: Vec<Uncertainty>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Uncertainty {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(flatten)]
    pub size: UncertaintySize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintySize {
    Symmetric(f64),
    Asymmetric { plus: f64, minus: f64 },
}

/// A measured quantity with its comparison settings.
///
/// Fields shared by both measurement kinds live here; the kind-specific
/// payload is in [`MeasurementKind`].
#[derive(Clone, Debug, Serialize)]
pub struct DependentVariable {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    /// All qualifiers, including the ones parsed into typed fields.
    pub qualifiers: QualifierMap,

    pub values: Vec<DataPoint>,

    pub measurement_type: MeasurementType,

    pub test_statistic: TestStatistic,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorTable>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub smearing: Option<ErrorTable>,

    pub kind: MeasurementKind,
}

impl DependentVariable {
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, MeasurementKind::Composite(_))
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    CrossSection(CrossSectionMeasurement),
    Composite(CompositeMeasurement),
}

#[derive(Clone, Debug, Serialize)]
pub struct CrossSectionMeasurement {
    pub selectfunc: String,

    /// Projection function per independent variable.
    pub projectfuncs: BTreeMap<String, String>,

    pub units: CrossSectionUnits,

    pub target: String,

    pub flux: FluxTable,
}

#[derive(Clone, Debug, Serialize)]
pub struct CompositeMeasurement {
    pub sub_measurements: Vec<Rc<DependentVariable>>,
}

/// A probe flux loaded from a (usually different) record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FluxTable {
    pub reference: ReferenceComponents,
    pub source: PathBuf,
    pub name: String,
    pub probe_particle: String,
    pub bin_content_type: String,
    pub bins: Vec<(f64, f64)>,
    pub values: Vec<f64>,
}

/// A covariance or correlation matrix, flattened in row-major order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorTable {
    pub reference: ReferenceComponents,
    pub source: PathBuf,
    pub name: String,
    pub error_type: ErrorType,
    pub values: Vec<f64>,
}

impl ErrorTable {
    /// Side of the square matrix, if the value count is a perfect square.
    pub fn dimension(&self) -> Option<usize> {
        let side = (self.values.len() as f64).sqrt().round() as usize;
        (side * side == self.values.len()).then_some(side)
    }
}

/// File name of a resource path, for compact display.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_table(values: Vec<f64>) -> ErrorTable {
        ErrorTable {
            reference: ReferenceComponents {
                reftype: "hepdata".into(),
                recordid: "1".into(),
                recordversion: Some("1".into()),
                resourcename: Some("Covariance".into()),
                qualifier: None,
            },
            source: PathBuf::from("Covariance.yaml"),
            name: "cov".into(),
            error_type: ErrorType::Covariance,
            values,
        }
    }

    #[test]
    fn error_table_dimension() {
        assert_eq!(error_table(vec![1.0; 9]).dimension(), Some(3));
        assert_eq!(error_table(vec![1.0; 8]).dimension(), None);
        assert_eq!(error_table(Vec::new()).dimension(), Some(0));
    }

    #[test]
    fn bin_edges_require_bins() {
        let var = IndependentVariable {
            name: "Enu".into(),
            units: None,
            values: vec![
                BinValue::Bin { low: 0.0, high: 1.0 },
                BinValue::Bin { low: 1.0, high: 2.0 },
            ],
        };
        assert_eq!(var.bin_edges(), Some(vec![(0.0, 1.0), (1.0, 2.0)]));

        let labels = IndependentVariable {
            name: "channel".into(),
            units: None,
            values: vec![BinValue::Label("CC0pi".into())],
        };
        assert_eq!(labels.bin_edges(), None);
    }

    #[test]
    fn existing_additional_resources_filters_missing() {
        let temp = tempfile::tempdir().expect("create temp dir");
        std::fs::write(temp.path().join("analysis.cxx"), "//").expect("write");

        let record = MeasurementRecord {
            components: error_table(Vec::new()).reference,
            record_path: temp.path().to_path_buf(),
            tables: Vec::new(),
            additional_resources: vec!["analysis.cxx".into(), "missing.root".into()],
        };
        assert_eq!(
            record.existing_additional_resources(),
            vec![temp.path().join("analysis.cxx")]
        );
    }
}
