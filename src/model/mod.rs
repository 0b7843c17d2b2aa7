//! Typed record model and the builder that constructs it.
//!
//! - [`raw`]: the YAML documents of an extracted record, parsed as-is.
//! - [`qualifiers`]: validated qualifier sets and their vocabularies.
//! - [`RecordModelBuilder`]: turns a resolved record into a
//!   [`MeasurementRecord`], following flux, error and sub-measurement
//!   references through the fetcher.

mod builder;
pub mod qualifiers;
pub mod raw;
mod render;
mod tables;
mod types;

pub use builder::RecordModelBuilder;
pub use qualifiers::{
    BaseUnit, BinWidthNormalization, CrossSectionUnits, ErrorType, MeasurementType, QualifierMap,
    TargetNormalization, TestStatistic, VariableType,
};
pub use types::{
    BinValue, CompositeMeasurement, CrossSectionMeasurement, DataPoint, DependentVariable,
    ErrorTable, FluxTable, IndependentVariable, MeasurementKind, MeasurementRecord,
    MeasurementTable, Uncertainty, UncertaintySize,
};

/// Fuzz-only entrypoint: parse table documents and convert their values.
#[cfg(feature = "fuzzing")]
pub fn fuzz_convert_table(input: &str) -> Result<(), crate::error::HepRefError> {
    use std::path::Path;

    let path = Path::new("<fuzz>");
    let documents: Vec<raw::RawTable> =
        raw::documents_from_str(input).map_err(|source| crate::error::HepRefError::YamlParse {
            path: path.to_path_buf(),
            source,
        })?;
    for table in &documents {
        for variable in &table.independent_variables {
            tables::independent_variable(variable, path)?;
        }
        for variable in &table.dependent_variables {
            tables::data_points(variable, path)?;
        }
    }
    Ok(())
}
