//! Validated qualifier sets.
//!
//! Qualifiers arrive as a free-form `name: value` list on every dependent
//! variable. They are parsed once into the structs below, which reject
//! missing required keys and out-of-vocabulary values before any nested
//! reference is followed.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::raw::{scalar_text, RawQualifier};
use crate::error::HepRefError;

pub const VARIABLE_TYPE: &str = "variable_type";
pub const MEASUREMENT_TYPE: &str = "measurement_type";
pub const TEST_STATISTIC: &str = "test_statistic";
pub const SELECTFUNC: &str = "selectfunc";
pub const PROJECTFUNC_SUFFIX: &str = ":projectfunc";
pub const TARGET: &str = "target";
pub const CROSS_SECTION_UNITS: &str = "cross_section_units";
pub const PROBE_FLUX: &str = "probe_flux";
pub const PROBE_FLUX_LEGACY: &str = "probe_spectra";
pub const ERRORS: &str = "errors";
pub const ERRORS_LEGACY: &str = "error";
pub const SMEARING: &str = "smearing";
pub const SUB_MEASUREMENTS: &str = "sub_measurements";
pub const PROBE_PARTICLE: &str = "probe_particle";
pub const BIN_CONTENT_TYPE: &str = "bin_content_type";
pub const ERROR_TYPE: &str = "error_type";

/// Units assumed when a cross-section variable declares none.
pub const DEFAULT_CROSS_SECTION_UNITS: &str = "pb|per_target|per_bin_width";

// ============================================================================
// Qualifier map
// ============================================================================

/// Qualifiers of one dependent variable in document order.
///
/// A key that appears more than once keeps its first position and its last
/// value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QualifierMap {
    entries: Vec<(String, String)>,
}

impl QualifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: &[RawQualifier]) -> Self {
        let mut map = Self::new();
        for qualifier in raw {
            map.insert(qualifier.name.clone(), scalar_text(&qualifier.value));
        }
        map
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// First non-empty value among `keys`.
    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn variable_type(&self) -> Option<VariableType> {
        self.get(VARIABLE_TYPE).and_then(VariableType::from_name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QualifierMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl Serialize for QualifierMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// Vocabularies
// ============================================================================

/// Role of a dependent variable, from its `variable_type` qualifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    CrossSectionMeasurement,
    CompositeCrossSectionMeasurement,
    ProbeFlux,
    ErrorTable,
}

impl VariableType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "cross_section_measurement" => Some(Self::CrossSectionMeasurement),
            "composite_cross_section_measurement" | "combined_cross_section_measurement" => {
                Some(Self::CompositeCrossSectionMeasurement)
            }
            "probe_flux" => Some(Self::ProbeFlux),
            "error_table" => Some(Self::ErrorTable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrossSectionMeasurement => "cross_section_measurement",
            Self::CompositeCrossSectionMeasurement => "composite_cross_section_measurement",
            Self::ProbeFlux => "probe_flux",
            Self::ErrorTable => "error_table",
        }
    }

    /// Whether variables of this type become part of a measurement table.
    pub fn is_measurement(self) -> bool {
        matches!(
            self,
            Self::CrossSectionMeasurement | Self::CompositeCrossSectionMeasurement
        )
    }
}

/// What a measurement's data points represent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    #[default]
    FluxAveragedDifferentialCrossSection,
    EventRate,
    Ratio,
    TotalCrossSection,
}

impl MeasurementType {
    const NAMES: &'static [&'static str] = &[
        "flux_averaged_differential_cross_section",
        "event_rate",
        "ratio",
        "total_cross_section",
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "flux_averaged_differential_cross_section" => {
                Some(Self::FluxAveragedDifferentialCrossSection)
            }
            "event_rate" => Some(Self::EventRate),
            "ratio" => Some(Self::Ratio),
            "total_cross_section" => Some(Self::TotalCrossSection),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FluxAveragedDifferentialCrossSection => {
                "flux_averaged_differential_cross_section"
            }
            Self::EventRate => "event_rate",
            Self::Ratio => "ratio",
            Self::TotalCrossSection => "total_cross_section",
        }
    }
}

/// Statistic used to compare a prediction against the measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatistic {
    #[default]
    Chi2,
    ShapeOnlyChi2,
    ShapePlusNormChi2,
    PoissonPdf,
}

impl TestStatistic {
    const NAMES: &'static [&'static str] =
        &["chi2", "shape_only_chi2", "shape_plus_norm_chi2", "poisson_pdf"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "chi2" => Some(Self::Chi2),
            "shape_only_chi2" => Some(Self::ShapeOnlyChi2),
            "shape_plus_norm_chi2" => Some(Self::ShapePlusNormChi2),
            "poisson_pdf" => Some(Self::PoissonPdf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chi2 => "chi2",
            Self::ShapeOnlyChi2 => "shape_only_chi2",
            Self::ShapePlusNormChi2 => "shape_plus_norm_chi2",
            Self::PoissonPdf => "poisson_pdf",
        }
    }
}

/// Kind of matrix held by an error table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Covariance,
    Correlation,
}

impl ErrorType {
    const NAMES: &'static [&'static str] = &["covariance", "correlation"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "covariance" => Some(Self::Covariance),
            "correlation" => Some(Self::Correlation),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Covariance => "covariance",
            Self::Correlation => "correlation",
        }
    }
}

/// Base unit of a cross-section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum BaseUnit {
    #[default]
    #[serde(rename = "pb")]
    Picobarn,
    #[serde(rename = "nb")]
    Nanobarn,
    #[serde(rename = "cm2")]
    SquareCentimetre,
    #[serde(rename = "10E-38cm2")]
    SquareCentimetreE38,
}

impl BaseUnit {
    const NAMES: &'static [&'static str] = &["pb", "nb", "cm2", "10E-38cm2"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pb" => Some(Self::Picobarn),
            "nb" => Some(Self::Nanobarn),
            "cm2" => Some(Self::SquareCentimetre),
            "10E-38cm2" => Some(Self::SquareCentimetreE38),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Picobarn => "pb",
            Self::Nanobarn => "nb",
            Self::SquareCentimetre => "cm2",
            Self::SquareCentimetreE38 => "10E-38cm2",
        }
    }
}

/// What a cross-section is normalized to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetNormalization {
    PerTarget,
    PerNucleon,
    PerNeutron,
    PerProton,
}

impl TargetNormalization {
    const NAMES: &'static [&'static str] =
        &["per_target", "per_nucleon", "per_neutron", "per_proton"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "per_target" => Some(Self::PerTarget),
            "per_nucleon" => Some(Self::PerNucleon),
            "per_neutron" => Some(Self::PerNeutron),
            "per_proton" => Some(Self::PerProton),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerTarget => "per_target",
            Self::PerNucleon => "per_nucleon",
            Self::PerNeutron => "per_neutron",
            Self::PerProton => "per_proton",
        }
    }
}

/// Bin-width normalization of a differential cross-section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinWidthNormalization {
    PerBinWidth,
    PerFirstBinWidth,
}

impl BinWidthNormalization {
    const NAMES: &'static [&'static str] = &["per_bin_width", "per_first_bin_width"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "per_bin_width" => Some(Self::PerBinWidth),
            "per_first_bin_width" => Some(Self::PerFirstBinWidth),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerBinWidth => "per_bin_width",
            Self::PerFirstBinWidth => "per_first_bin_width",
        }
    }
}

/// Parsed `cross_section_units`: at most one flag from each vocabulary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CrossSectionUnits {
    pub base: BaseUnit,
    pub target: Option<TargetNormalization>,
    pub bin_width: Option<BinWidthNormalization>,
}

impl CrossSectionUnits {
    /// Parse a `|`-separated flag list.
    ///
    /// The base unit defaults to `pb` when no base flag is given.
    pub fn parse(flags: &str, variable: &str) -> Result<Self, HepRefError> {
        let mut base = None;
        let mut target = None;
        let mut bin_width = None;

        for flag in flags.split('|').map(str::trim).filter(|flag| !flag.is_empty()) {
            let duplicate = if let Some(unit) = BaseUnit::from_name(flag) {
                base.replace(unit).is_some()
            } else if let Some(norm) = TargetNormalization::from_name(flag) {
                target.replace(norm).is_some()
            } else if let Some(norm) = BinWidthNormalization::from_name(flag) {
                bin_width.replace(norm).is_some()
            } else {
                return Err(invalid(
                    variable,
                    format!(
                        "invalid {CROSS_SECTION_UNITS} flag '{flag}' in '{flags}'. Valid flags are [{}], [{}] and [{}]",
                        BaseUnit::NAMES.join(", "),
                        TargetNormalization::NAMES.join(", "),
                        BinWidthNormalization::NAMES.join(", ")
                    ),
                ));
            };
            if duplicate {
                return Err(invalid(
                    variable,
                    format!(
                        "{CROSS_SECTION_UNITS} '{flags}' sets more than one flag of the same kind as '{flag}'"
                    ),
                ));
            }
        }

        Ok(Self {
            base: base.unwrap_or_default(),
            target,
            bin_width,
        })
    }
}

impl fmt::Display for CrossSectionUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.as_str())?;
        if let Some(target) = self.target {
            write!(f, "|{}", target.as_str())?;
        }
        if let Some(bin_width) = self.bin_width {
            write!(f, "|{}", bin_width.as_str())?;
        }
        Ok(())
    }
}

// ============================================================================
// Validated qualifier sets
// ============================================================================

/// Qualifiers shared by every measurement variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommonQualifiers {
    pub measurement_type: MeasurementType,
    pub test_statistic: TestStatistic,
    pub errors: Option<String>,
    pub smearing: Option<String>,
}

/// Qualifiers of a simple cross-section measurement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossSectionQualifiers {
    pub selectfunc: String,
    /// Independent variable name to projection function, one entry per variable.
    pub projectfuncs: BTreeMap<String, String>,
    pub units: CrossSectionUnits,
    pub target: String,
    pub probe_flux: String,
}

/// Qualifiers of a composite measurement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeQualifiers {
    pub sub_measurements: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KindQualifiers {
    CrossSection(CrossSectionQualifiers),
    Composite(CompositeQualifiers),
}

/// Everything a measurement variable's qualifiers must provide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeasurementQualifiers {
    pub common: CommonQualifiers,
    pub kind: KindQualifiers,
}

impl MeasurementQualifiers {
    /// Validate the qualifiers of the measurement variable `variable`.
    ///
    /// `independent_names` are the table's independent variables, each of
    /// which needs a `<name>:projectfunc` entry on a simple cross-section.
    pub fn parse(
        map: &QualifierMap,
        independent_names: &[&str],
        variable: &str,
    ) -> Result<Self, HepRefError> {
        let variable_type = required(map, VARIABLE_TYPE, variable)?;
        let kind = match VariableType::from_name(variable_type) {
            Some(VariableType::CrossSectionMeasurement) => {
                KindQualifiers::CrossSection(parse_cross_section(map, independent_names, variable)?)
            }
            Some(VariableType::CompositeCrossSectionMeasurement) => {
                KindQualifiers::Composite(parse_composite(map, variable)?)
            }
            _ => {
                return Err(invalid(
                    variable,
                    format!(
                        "{VARIABLE_TYPE} '{variable_type}' is not a measurement type. Expected cross_section_measurement or composite_cross_section_measurement"
                    ),
                ))
            }
        };

        let measurement_type = match map.get(MEASUREMENT_TYPE) {
            None => MeasurementType::default(),
            Some(name) => MeasurementType::from_name(name.trim()).ok_or_else(|| {
                out_of_vocabulary(variable, MEASUREMENT_TYPE, name, MeasurementType::NAMES)
            })?,
        };
        let test_statistic = match map.get(TEST_STATISTIC) {
            None => TestStatistic::default(),
            Some(name) => TestStatistic::from_name(name.trim()).ok_or_else(|| {
                out_of_vocabulary(variable, TEST_STATISTIC, name, TestStatistic::NAMES)
            })?,
        };

        Ok(Self {
            common: CommonQualifiers {
                measurement_type,
                test_statistic,
                errors: map.first_of(&[ERRORS, ERRORS_LEGACY]).map(str::to_string),
                smearing: map.first_of(&[SMEARING]).map(str::to_string),
            },
            kind,
        })
    }
}

fn parse_cross_section(
    map: &QualifierMap,
    independent_names: &[&str],
    variable: &str,
) -> Result<CrossSectionQualifiers, HepRefError> {
    let mut projectfuncs = BTreeMap::new();
    for name in independent_names {
        let key = format!("{name}{PROJECTFUNC_SUFFIX}");
        let func = map
            .get(&key)
            .map(str::trim)
            .filter(|func| !func.is_empty())
            .ok_or_else(|| {
                invalid(
                    variable,
                    format!(
                        "missing qualifier '{key}': independent variable '{name}' has no projection function"
                    ),
                )
            })?;
        projectfuncs.insert((*name).to_string(), func.to_string());
    }

    let units = CrossSectionUnits::parse(
        map.get(CROSS_SECTION_UNITS)
            .unwrap_or(DEFAULT_CROSS_SECTION_UNITS),
        variable,
    )?;

    let probe_flux = map
        .first_of(&[PROBE_FLUX, PROBE_FLUX_LEGACY])
        .ok_or_else(|| invalid(variable, format!("missing required qualifier '{PROBE_FLUX}'")))?;

    Ok(CrossSectionQualifiers {
        selectfunc: required(map, SELECTFUNC, variable)?.to_string(),
        projectfuncs,
        units,
        target: required(map, TARGET, variable)?.to_string(),
        probe_flux: probe_flux.to_string(),
    })
}

fn parse_composite(map: &QualifierMap, variable: &str) -> Result<CompositeQualifiers, HepRefError> {
    let sub_measurements: Vec<String> = required(map, SUB_MEASUREMENTS, variable)?
        .split(',')
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .map(str::to_string)
        .collect();

    if sub_measurements.is_empty() {
        return Err(invalid(
            variable,
            format!("qualifier '{SUB_MEASUREMENTS}' lists no references"),
        ));
    }
    Ok(CompositeQualifiers { sub_measurements })
}

/// Qualifiers of a probe flux variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FluxQualifiers {
    pub probe_particle: String,
    pub bin_content_type: String,
}

impl FluxQualifiers {
    pub fn parse(map: &QualifierMap, variable: &str) -> Result<Self, HepRefError> {
        expect_variable_type(map, VariableType::ProbeFlux, variable)?;
        Ok(Self {
            probe_particle: required(map, PROBE_PARTICLE, variable)?.to_string(),
            bin_content_type: required(map, BIN_CONTENT_TYPE, variable)?.to_string(),
        })
    }
}

/// Qualifiers of an error (covariance or correlation) variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorQualifiers {
    pub error_type: ErrorType,
}

impl ErrorQualifiers {
    pub fn parse(map: &QualifierMap, variable: &str) -> Result<Self, HepRefError> {
        expect_variable_type(map, VariableType::ErrorTable, variable)?;
        let name = required(map, ERROR_TYPE, variable)?;
        let error_type = ErrorType::from_name(name)
            .ok_or_else(|| out_of_vocabulary(variable, ERROR_TYPE, name, ErrorType::NAMES))?;
        Ok(Self { error_type })
    }
}

fn expect_variable_type(
    map: &QualifierMap,
    expected: VariableType,
    variable: &str,
) -> Result<(), HepRefError> {
    let found = required(map, VARIABLE_TYPE, variable)?;
    if VariableType::from_name(found) == Some(expected) {
        Ok(())
    } else {
        Err(invalid(
            variable,
            format!(
                "{VARIABLE_TYPE} is '{found}', expected '{}'",
                expected.as_str()
            ),
        ))
    }
}

fn required<'m>(map: &'m QualifierMap, key: &str, variable: &str) -> Result<&'m str, HepRefError> {
    map.first_of(&[key])
        .ok_or_else(|| invalid(variable, format!("missing required qualifier '{key}'")))
}

fn out_of_vocabulary(variable: &str, key: &str, value: &str, valid: &[&str]) -> HepRefError {
    invalid(
        variable,
        format!("invalid {key} '{value}', must be one of [{}]", valid.join(", ")),
    )
}

fn invalid(variable: &str, message: String) -> HepRefError {
    HepRefError::QualifierValidation {
        variable: variable.to_string(),
        message,
    }
}
