use std::fmt;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info};

use super::qualifiers::{
    KindQualifiers, MeasurementQualifiers, QualifierMap, VariableType, VARIABLE_TYPE,
};
use super::raw::{read_documents, read_table, RawDependentVariable, RawTable, SubmissionDocument};
use super::tables;
use super::types::{
    file_name, CompositeMeasurement, CrossSectionMeasurement, DependentVariable, ErrorTable,
    FluxTable, IndependentVariable, MeasurementKind, MeasurementRecord, MeasurementTable,
};
use crate::cache::MANIFEST_FILE_NAME;
use crate::error::HepRefError;
use crate::fetch::{ResourceFetcher, Transport, UreqTransport};
use crate::reference::{PartialReference, RawReference, ReferenceComponents};

/// Identity of a dependent variable while it is being built.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ResolutionKey {
    reftype: String,
    recordid: String,
    resource: String,
    variable: String,
}

impl ResolutionKey {
    fn new(context: &ReferenceComponents, source: &Path, variable: &str) -> Self {
        Self {
            reftype: context.reftype.clone(),
            recordid: context.recordid.clone(),
            resource: file_name(source),
            variable: variable.to_string(),
        }
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}:{}",
            self.reftype, self.recordid, self.resource, self.variable
        )
    }
}

/// Builds the typed model of a record, following nested references through
/// the fetcher.
///
/// Nested resolutions run depth-first in document order. Every dependent
/// variable under construction is tracked so that a reference that leads
/// back to it fails with [`HepRefError::CycleDetected`].
pub struct RecordModelBuilder<'f, T: Transport = UreqTransport> {
    fetcher: &'f ResourceFetcher<T>,
    resolving: Vec<ResolutionKey>,
}

impl<'f, T: Transport> RecordModelBuilder<'f, T> {
    pub fn new(fetcher: &'f ResourceFetcher<T>) -> Self {
        Self {
            fetcher,
            resolving: Vec::new(),
        }
    }

    /// Resolve `reference` against `context` and build the record it names.
    ///
    /// A reference to a single resource builds only the tables of that
    /// data file.
    pub fn build_reference<'a>(
        &mut self,
        reference: impl Into<RawReference<'a>>,
        context: &PartialReference,
    ) -> Result<MeasurementRecord, HepRefError> {
        let resolved = self.fetcher.resolve_reference(reference, context)?;
        self.build(
            &resolved.resource_path,
            &resolved.record_path,
            &resolved.components,
        )
    }

    /// Build a record from an extracted record directory.
    pub fn build(
        &mut self,
        resource_path: &Path,
        record_path: &Path,
        components: &ReferenceComponents,
    ) -> Result<MeasurementRecord, HepRefError> {
        let manifest = record_path.join(MANIFEST_FILE_NAME);
        let documents: Vec<SubmissionDocument> = read_documents(&manifest)?;
        let only = (resource_path.is_file() && resource_path != manifest.as_path())
            .then_some(resource_path);

        info!(
            reference = %components,
            manifest = %manifest.display(),
            documents = documents.len(),
            "building record"
        );

        let mut record = MeasurementRecord {
            components: components.clone(),
            record_path: record_path.to_path_buf(),
            tables: Vec::new(),
            additional_resources: Vec::new(),
        };
        let mut matched = false;

        for document in &documents {
            let Some(data_file) = document.data_file.as_deref() else {
                record.additional_resources.extend(
                    document
                        .additional_resources
                        .iter()
                        .map(|resource| resource.location.clone()),
                );
                continue;
            };

            let data_path = record_path.join(data_file);
            if only.is_some_and(|only| only != data_path.as_path()) {
                continue;
            }
            matched = true;

            let name = document
                .name
                .clone()
                .unwrap_or_else(|| data_file.trim_end_matches(".yaml").to_string());
            let context = table_components(components, data_file);
            self.build_data_file(&name, &data_path, &context, &mut record.tables)?;
        }

        if let Some(only) = only.filter(|_| !matched) {
            // A resource the manifest doesn't list is still a table of this record.
            let data_file = file_name(only);
            let name = data_file.trim_end_matches(".yaml").to_string();
            let context = table_components(components, &data_file);
            self.build_data_file(&name, only, &context, &mut record.tables)?;
        }

        debug!(reference = %components, tables = record.tables.len(), "record built");
        Ok(record)
    }

    fn build_data_file(
        &mut self,
        name: &str,
        data_path: &Path,
        context: &ReferenceComponents,
        tables: &mut Vec<MeasurementTable>,
    ) -> Result<(), HepRefError> {
        for raw in read_documents::<RawTable>(data_path)? {
            if !raw.dependent_variables.iter().any(is_measurement) {
                debug!(table = name, "skipping table without measurements");
                continue;
            }
            tables.push(self.build_table(name, &raw, data_path, context)?);
        }
        Ok(())
    }

    /// Build one table document, keeping only its measurement variables.
    pub fn build_table(
        &mut self,
        name: &str,
        raw: &RawTable,
        source: &Path,
        context: &ReferenceComponents,
    ) -> Result<MeasurementTable, HepRefError> {
        debug!(table = name, source = %source.display(), "building table");

        let independent_variables = raw
            .independent_variables
            .iter()
            .map(|variable| tables::independent_variable(variable, source))
            .collect::<Result<Vec<_>, _>>()?;

        let mut dependent_variables = Vec::new();
        for variable in raw.dependent_variables.iter().filter(|v| is_measurement(v)) {
            dependent_variables.push(self.build_dependent_variable(
                &independent_variables,
                variable,
                source,
                context,
            )?);
        }

        Ok(MeasurementTable {
            name: name.to_string(),
            source: source.to_path_buf(),
            independent_variables,
            dependent_variables,
        })
    }

    /// Build one measurement variable and everything it references.
    ///
    /// # Errors
    /// Fails on invalid qualifiers, on any nested resolution failure, and
    /// when the variable is already being built further up the chain.
    pub fn build_dependent_variable(
        &mut self,
        independent_variables: &[IndependentVariable],
        raw: &RawDependentVariable,
        source: &Path,
        context: &ReferenceComponents,
    ) -> Result<DependentVariable, HepRefError> {
        let key = ResolutionKey::new(context, source, &raw.header.name);
        if self.resolving.contains(&key) {
            let mut chain: Vec<String> = self.resolving.iter().map(ToString::to_string).collect();
            chain.push(key.to_string());
            return Err(HepRefError::CycleDetected {
                reference: key.to_string(),
                chain,
            });
        }

        self.resolving.push(key);
        let result = self.dependent_variable(independent_variables, raw, source, context);
        self.resolving.pop();
        result
    }

    fn dependent_variable(
        &mut self,
        independent_variables: &[IndependentVariable],
        raw: &RawDependentVariable,
        source: &Path,
        context: &ReferenceComponents,
    ) -> Result<DependentVariable, HepRefError> {
        let name = raw.header.name.as_str();
        let qualifiers = QualifierMap::from_raw(&raw.qualifiers);
        let independent_names: Vec<&str> = independent_variables
            .iter()
            .map(|variable| variable.name.as_str())
            .collect();
        let parsed = MeasurementQualifiers::parse(&qualifiers, &independent_names, name)?;

        let nested = context.record_context();
        let kind = match parsed.kind {
            KindQualifiers::CrossSection(xsec) => {
                let flux = self.load_flux(&xsec.probe_flux, &nested)?;
                MeasurementKind::CrossSection(CrossSectionMeasurement {
                    selectfunc: xsec.selectfunc,
                    projectfuncs: xsec.projectfuncs,
                    units: xsec.units,
                    target: xsec.target,
                    flux,
                })
            }
            KindQualifiers::Composite(composite) => {
                let sub_measurements = composite
                    .sub_measurements
                    .iter()
                    .map(|reference| self.load_sub_measurement(reference, &nested))
                    .collect::<Result<Vec<_>, _>>()?;
                MeasurementKind::Composite(CompositeMeasurement { sub_measurements })
            }
        };

        let errors = parsed
            .common
            .errors
            .as_deref()
            .map(|reference| self.load_error_table(reference, &nested))
            .transpose()?;
        let smearing = parsed
            .common
            .smearing
            .as_deref()
            .map(|reference| self.load_error_table(reference, &nested))
            .transpose()?;

        Ok(DependentVariable {
            name: name.to_string(),
            units: raw.header.units_text(),
            values: tables::data_points(raw, source)?,
            qualifiers,
            measurement_type: parsed.common.measurement_type,
            test_statistic: parsed.common.test_statistic,
            errors,
            smearing,
            kind,
        })
    }

    fn load_flux(
        &self,
        reference: &str,
        context: &PartialReference,
    ) -> Result<FluxTable, HepRefError> {
        debug!(reference, %context, "loading probe flux");
        let resolved = self.fetcher.resolve_reference(reference, context)?;
        let raw = read_table(&resolved.resource_path)?;
        tables::flux_table(resolved.components, &resolved.resource_path, &raw)
    }

    fn load_error_table(
        &self,
        reference: &str,
        context: &PartialReference,
    ) -> Result<ErrorTable, HepRefError> {
        debug!(reference, %context, "loading error table");
        let resolved = self.fetcher.resolve_reference(reference, context)?;
        let raw = read_table(&resolved.resource_path)?;
        tables::error_table(resolved.components, &resolved.resource_path, &raw)
    }

    fn load_sub_measurement(
        &mut self,
        reference: &str,
        context: &PartialReference,
    ) -> Result<Rc<DependentVariable>, HepRefError> {
        debug!(reference, %context, "loading sub-measurement");
        let resolved = self.fetcher.resolve_reference(reference, context)?;
        let raw = read_table(&resolved.resource_path)?;

        let variable = raw
            .dependent_variables
            .iter()
            .filter(|variable| is_measurement(variable))
            .find(|variable| match resolved.components.qualifier.as_deref() {
                Some(name) => variable.header.name == name,
                None => true,
            })
            .ok_or_else(|| HepRefError::SubReferenceResolution {
                reference: reference.to_string(),
            })?;

        let independent_variables = raw
            .independent_variables
            .iter()
            .map(|axis| tables::independent_variable(axis, &resolved.resource_path))
            .collect::<Result<Vec<_>, _>>()?;

        self.build_dependent_variable(
            &independent_variables,
            variable,
            &resolved.resource_path,
            &resolved.components,
        )
        .map(Rc::new)
    }
}

fn is_measurement(variable: &RawDependentVariable) -> bool {
    variable
        .qualifier(VARIABLE_TYPE)
        .and_then(|name| VariableType::from_name(&name))
        .is_some_and(VariableType::is_measurement)
}

/// Components naming one data file of a record.
fn table_components(record: &ReferenceComponents, data_file: &str) -> ReferenceComponents {
    ReferenceComponents {
        resourcename: Some(data_file.to_string()),
        qualifier: None,
        ..record.clone()
    }
}
