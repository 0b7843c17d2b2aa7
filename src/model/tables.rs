//! Conversion of raw table documents into typed values.
//!
//! Nothing here touches the network or the cache; the builder resolves
//! references and hands the parsed documents over.

use std::path::Path;

use serde_yaml::Value;

use super::qualifiers::{ErrorQualifiers, FluxQualifiers, QualifierMap, VariableType, VARIABLE_TYPE};
use super::raw::{scalar_number, scalar_text, RawDependentVariable, RawError, RawTable, RawValue, RawVariable};
use super::types::{
    BinValue, DataPoint, ErrorTable, FluxTable, IndependentVariable, Uncertainty, UncertaintySize,
};
use crate::error::HepRefError;
use crate::reference::ReferenceComponents;

/// Convert a raw independent variable.
pub fn independent_variable(raw: &RawVariable, source: &Path) -> Result<IndependentVariable, HepRefError> {
    let values = raw
        .values
        .iter()
        .map(|value| bin_value(value, &raw.header.name, source))
        .collect::<Result<_, _>>()?;
    Ok(IndependentVariable {
        name: raw.header.name.clone(),
        units: raw.header.units_text(),
        values,
    })
}

fn bin_value(raw: &RawValue, variable: &str, source: &Path) -> Result<BinValue, HepRefError> {
    match (&raw.low, &raw.high, &raw.value) {
        (Some(low), Some(high), _) => {
            let low = number(low, variable, source)?;
            let high = number(high, variable, source)?;
            Ok(BinValue::Bin { low, high })
        }
        (_, _, Some(value)) => Ok(match scalar_number(value) {
            Some(number) => BinValue::Point(number),
            None => BinValue::Label(scalar_text(value)),
        }),
        _ => Err(malformed(
            source,
            format!("independent variable '{variable}' has an entry with neither low/high edges nor a value"),
        )),
    }
}

/// Convert the values of a raw dependent variable.
pub fn data_points(raw: &RawDependentVariable, source: &Path) -> Result<Vec<DataPoint>, HepRefError> {
    raw.values
        .iter()
        .map(|value| {
            let central = value.value.as_ref().and_then(scalar_number);
            let uncertainties = value
                .errors
                .iter()
                .map(|error| uncertainty(error, central, &raw.header.name, source))
                .collect::<Result<_, _>>()?;
            Ok(DataPoint {
                value: central,
                uncertainties,
            })
        })
        .collect()
}

fn uncertainty(
    raw: &RawError,
    central: Option<f64>,
    variable: &str,
    source: &Path,
) -> Result<Uncertainty, HepRefError> {
    let size = match (&raw.symerror, &raw.asymerror) {
        (Some(sym), _) => UncertaintySize::Symmetric(error_size(sym, central, variable, source)?),
        (None, Some(asym)) => UncertaintySize::Asymmetric {
            plus: error_size(&asym.plus, central, variable, source)?,
            minus: error_size(&asym.minus, central, variable, source)?,
        },
        (None, None) => {
            return Err(malformed(
                source,
                format!("dependent variable '{variable}' has an error with neither symerror nor asymerror"),
            ))
        }
    };
    Ok(Uncertainty {
        label: raw.label.clone(),
        size,
    })
}

/// An error size; `N%` is taken relative to the central value.
fn error_size(
    value: &Value,
    central: Option<f64>,
    variable: &str,
    source: &Path,
) -> Result<f64, HepRefError> {
    if let Value::String(text) = value {
        if let Some(percent) = text.trim().strip_suffix('%') {
            let fraction = percent.trim().parse::<f64>().ok().map(|p| p / 100.0);
            if let (Some(fraction), Some(central)) = (fraction, central) {
                return Ok(fraction * central.abs());
            }
            return Err(malformed(
                source,
                format!("dependent variable '{variable}' has an unusable relative error '{text}'"),
            ));
        }
    }
    number(value, variable, source)
}

fn number(value: &Value, variable: &str, source: &Path) -> Result<f64, HepRefError> {
    scalar_number(value).ok_or_else(|| {
        malformed(
            source,
            format!("variable '{variable}' has non-numeric entry '{}'", scalar_text(value)),
        )
    })
}

/// Pick the dependent variable a nested reference points at.
///
/// With a qualifier the variable is matched by name. Without one the first
/// variable of the wanted type is taken, falling back to the very first
/// variable so that a mistyped table fails qualifier validation.
pub fn select_variable<'t>(
    table: &'t RawTable,
    qualifier: Option<&str>,
    wanted: VariableType,
) -> Option<&'t RawDependentVariable> {
    match qualifier {
        Some(name) => table
            .dependent_variables
            .iter()
            .find(|variable| variable.header.name == name),
        None => table
            .dependent_variables
            .iter()
            .find(|variable| {
                variable
                    .qualifier(VARIABLE_TYPE)
                    .and_then(|name| VariableType::from_name(&name))
                    == Some(wanted)
            })
            .or_else(|| table.dependent_variables.first()),
    }
}

/// Build a flux table from the document a flux reference resolved to.
pub fn flux_table(
    reference: ReferenceComponents,
    source: &Path,
    table: &RawTable,
) -> Result<FluxTable, HepRefError> {
    let variable = select_variable(table, reference.qualifier.as_deref(), VariableType::ProbeFlux)
        .ok_or_else(|| missing_variable(&reference, source, "probe_flux"))?;
    let name = variable.header.name.as_str();
    let qualifiers = FluxQualifiers::parse(&QualifierMap::from_raw(&variable.qualifiers), name)?;

    let axis = table.independent_variables.first().ok_or_else(|| {
        malformed(source, format!("flux '{name}' has no independent variable"))
    })?;
    let bins = independent_variable(axis, source)?
        .bin_edges()
        .ok_or_else(|| {
            malformed(
                source,
                format!("flux axis '{}' must be given as low/high bins", axis.header.name),
            )
        })?;
    let values = numeric_values(variable, source)?;

    if values.len() != bins.len() {
        return Err(malformed(
            source,
            format!(
                "flux '{name}' has {} bin contents for {} bins",
                values.len(),
                bins.len()
            ),
        ));
    }

    Ok(FluxTable {
        reference,
        source: source.to_path_buf(),
        name: name.to_string(),
        probe_particle: qualifiers.probe_particle,
        bin_content_type: qualifiers.bin_content_type,
        bins,
        values,
    })
}

/// Build an error table from the document an error or smearing reference resolved to.
pub fn error_table(
    reference: ReferenceComponents,
    source: &Path,
    table: &RawTable,
) -> Result<ErrorTable, HepRefError> {
    let variable = select_variable(table, reference.qualifier.as_deref(), VariableType::ErrorTable)
        .ok_or_else(|| missing_variable(&reference, source, "error_table"))?;
    let name = variable.header.name.as_str();
    let qualifiers = ErrorQualifiers::parse(&QualifierMap::from_raw(&variable.qualifiers), name)?;

    Ok(ErrorTable {
        values: numeric_values(variable, source)?,
        reference,
        source: source.to_path_buf(),
        name: name.to_string(),
        error_type: qualifiers.error_type,
    })
}

fn numeric_values(variable: &RawDependentVariable, source: &Path) -> Result<Vec<f64>, HepRefError> {
    variable
        .values
        .iter()
        .map(|value| match &value.value {
            Some(value) => number(value, &variable.header.name, source),
            None => Err(malformed(
                source,
                format!("variable '{}' has an entry without a value", variable.header.name),
            )),
        })
        .collect()
}

fn missing_variable(reference: &ReferenceComponents, source: &Path, kind: &str) -> HepRefError {
    let message = match reference.qualifier.as_deref() {
        Some(name) => format!("no dependent variable named '{name}' (wanted {kind} for {reference})"),
        None => format!("no dependent variables (wanted {kind} for {reference})"),
    };
    malformed(source, message)
}

fn malformed(source: &Path, message: String) -> HepRefError {
    HepRefError::MalformedTable {
        source_path: source.to_path_buf(),
        message,
    }
}
