//! Human-readable rendering of the measurement model.
//!
//! Every model type implements `Display` as an indented outline; nested
//! objects are rendered in place, one level deeper.

use std::fmt::{self, Write};

use super::types::{
    file_name, BinValue, DependentVariable, ErrorTable, FluxTable, IndependentVariable,
    MeasurementKind, MeasurementRecord, MeasurementTable,
};

const INDENT: &str = "  ";

/// Values shown before a list is elided.
const MAX_LISTED_VALUES: usize = 8;

trait Outline {
    fn outline(&self, out: &mut dyn Write, depth: usize) -> fmt::Result;
}

fn pad(out: &mut dyn Write, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        out.write_str(INDENT)?;
    }
    Ok(())
}

fn list<T: fmt::Display>(values: &[T]) -> String {
    let mut rendered: Vec<String> = values
        .iter()
        .take(MAX_LISTED_VALUES)
        .map(ToString::to_string)
        .collect();
    if values.len() > MAX_LISTED_VALUES {
        rendered.push(format!("... ({} total)", values.len()));
    }
    format!("[{}]", rendered.join(", "))
}

impl Outline for MeasurementRecord {
    fn outline(&self, out: &mut dyn Write, depth: usize) -> fmt::Result {
        pad(out, depth)?;
        writeln!(out, "Record {} ({})", self.components, self.record_path.display())?;
        for table in &self.tables {
            table.outline(out, depth + 1)?;
        }
        if !self.additional_resources.is_empty() {
            pad(out, depth + 1)?;
            writeln!(out, "additional resources: {}", self.additional_resources.join(", "))?;
        }
        Ok(())
    }
}

impl Outline for MeasurementTable {
    fn outline(&self, out: &mut dyn Write, depth: usize) -> fmt::Result {
        pad(out, depth)?;
        writeln!(out, "Table {} ({})", self.name, file_name(&self.source))?;
        for variable in &self.independent_variables {
            variable.outline(out, depth + 1)?;
        }
        for variable in &self.dependent_variables {
            variable.outline(out, depth + 1)?;
        }
        Ok(())
    }
}

impl Outline for IndependentVariable {
    fn outline(&self, out: &mut dyn Write, depth: usize) -> fmt::Result {
        pad(out, depth)?;
        write!(out, "Independent {}", self.name)?;
        if let Some(units) = &self.units {
            write!(out, " [{units}]")?;
        }
        writeln!(out, ": {}", list(&self.values))
    }
}

impl Outline for DependentVariable {
    fn outline(&self, out: &mut dyn Write, depth: usize) -> fmt::Result {
        pad(out, depth)?;
        let kind = match self.kind {
            MeasurementKind::CrossSection(_) => "CrossSectionMeasurement",
            MeasurementKind::Composite(_) => "CompositeMeasurement",
        };
        write!(out, "{kind} {}", self.name)?;
        if let Some(units) = &self.units {
            write!(out, " [{units}]")?;
        }
        writeln!(out)?;

        pad(out, depth + 1)?;
        writeln!(
            out,
            "measurement_type: {}, test_statistic: {}, points: {}",
            self.measurement_type.as_str(),
            self.test_statistic.as_str(),
            self.values.len()
        )?;

        match &self.kind {
            MeasurementKind::CrossSection(xsec) => {
                pad(out, depth + 1)?;
                writeln!(out, "selectfunc: {}", xsec.selectfunc)?;
                for (axis, func) in &xsec.projectfuncs {
                    pad(out, depth + 1)?;
                    writeln!(out, "{axis}:projectfunc: {func}")?;
                }
                pad(out, depth + 1)?;
                writeln!(out, "target: {}, units: {}", xsec.target, xsec.units)?;
                xsec.flux.outline(out, depth + 1)?;
            }
            MeasurementKind::Composite(composite) => {
                pad(out, depth + 1)?;
                writeln!(out, "sub_measurements: {}", composite.sub_measurements.len())?;
                for sub in &composite.sub_measurements {
                    sub.outline(out, depth + 2)?;
                }
            }
        }

        if let Some(errors) = &self.errors {
            pad(out, depth + 1)?;
            writeln!(out, "errors:")?;
            errors.outline(out, depth + 2)?;
        }
        if let Some(smearing) = &self.smearing {
            pad(out, depth + 1)?;
            writeln!(out, "smearing:")?;
            smearing.outline(out, depth + 2)?;
        }
        Ok(())
    }
}

impl Outline for FluxTable {
    fn outline(&self, out: &mut dyn Write, depth: usize) -> fmt::Result {
        pad(out, depth)?;
        writeln!(
            out,
            "Flux {} from {} ({}): probe_particle={}, bin_content_type={}, bins={}",
            self.name,
            self.reference,
            file_name(&self.source),
            self.probe_particle,
            self.bin_content_type,
            self.bins.len()
        )?;
        pad(out, depth + 1)?;
        writeln!(out, "values: {}", list(&self.values))
    }
}

impl Outline for ErrorTable {
    fn outline(&self, out: &mut dyn Write, depth: usize) -> fmt::Result {
        pad(out, depth)?;
        write!(
            out,
            "ErrorTable {} from {} ({}): {}",
            self.name,
            self.reference,
            file_name(&self.source),
            self.error_type.as_str()
        )?;
        match self.dimension() {
            Some(side) => writeln!(out, ", {side}x{side}"),
            None => writeln!(out, ", {} values", self.values.len()),
        }
    }
}

impl fmt::Display for BinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinValue::Bin { low, high } => write!(f, "{low}-{high}"),
            BinValue::Point(value) => write!(f, "{value}"),
            BinValue::Label(label) => f.write_str(label),
        }
    }
}

impl fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outline(f, 0)
    }
}

impl fmt::Display for MeasurementTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outline(f, 0)
    }
}

impl fmt::Display for IndependentVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outline(f, 0)
    }
}

impl fmt::Display for DependentVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outline(f, 0)
    }
}

impl fmt::Display for FluxTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outline(f, 0)
    }
}

impl fmt::Display for ErrorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outline(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::qualifiers::ErrorType;
    use crate::reference::ReferenceComponents;
    use std::path::PathBuf;

    fn flux() -> FluxTable {
        FluxTable {
            reference: ReferenceComponents {
                reftype: "hepdata".into(),
                recordid: "9".into(),
                recordversion: Some("2".into()),
                resourcename: Some("Flux".into()),
                qualifier: None,
            },
            source: PathBuf::from("/db/hepdata/9/HEPData-9-v2/Flux.yaml"),
            name: "numu".into(),
            probe_particle: "14".into(),
            bin_content_type: "count".into(),
            bins: vec![(0.0, 1.0); 10],
            values: (0..10).map(f64::from).collect(),
        }
    }

    #[test]
    fn flux_outline_elides_long_lists() {
        let text = flux().to_string();
        assert!(text.starts_with("Flux numu from hepdata:9v2/Flux (Flux.yaml)"));
        assert!(text.contains("... (10 total)"));
        assert!(text.contains("\n  values: [0, 1, 2"));
    }

    #[test]
    fn error_table_shows_dimension() {
        let table = ErrorTable {
            reference: flux().reference,
            source: PathBuf::from("Cov.yaml"),
            name: "cov".into(),
            error_type: ErrorType::Correlation,
            values: vec![1.0; 4],
        };
        assert!(table.to_string().trim_end().ends_with("correlation, 2x2"));
    }

    #[test]
    fn bins_render_as_ranges() {
        let axis = IndependentVariable {
            name: "Enu".into(),
            units: Some("GeV".into()),
            values: vec![BinValue::Bin { low: 0.5, high: 1.0 }],
        };
        assert_eq!(axis.to_string(), "Independent Enu [GeV]: [0.5-1]\n");
    }
}
