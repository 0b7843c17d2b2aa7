//! Criterion microbenches for hepref parsing.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure:
//! - reference parsing (parse_reference)
//! - table document parsing (documents_from_str)
//! - qualifier validation of a cross-section measurement

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use hepref::model::qualifiers::MeasurementQualifiers;
use hepref::model::raw::{documents_from_str, RawTable};
use hepref::model::QualifierMap;
use hepref::reference::{parse_reference, PartialReference};

const REFERENCES: &[&str] = &[
    "hepdata:12345/Table1:xsec",
    "hepdata-sandbox:777v3/Flux",
    "12345",
    "Covariance",
    "inspirehep:1234567/Table2",
];

const TABLE_FIXTURE: &str = "\
independent_variables:
- header: {name: Enu, units: GeV}
  values:
  - {low: 0.0, high: 1.0}
  - {low: 1.0, high: 2.0}
  - {low: 2.0, high: 4.0}
  - {low: 4.0, high: 8.0}
dependent_variables:
- header: {name: xsec, units: 10E-38cm2}
  qualifiers:
  - {name: variable_type, value: cross_section_measurement}
  - {name: selectfunc, value: 'analysis.cxx:SelectCCInc'}
  - {name: 'Enu:projectfunc', value: 'analysis.cxx:ProjectEnu'}
  - {name: target, value: CH}
  - {name: probe_flux, value: '300v1/Flux:numu'}
  - {name: cross_section_units, value: 'cm2|per_nucleon|per_bin_width'}
  values:
  - value: 1.2
    errors:
    - {symerror: 0.1, label: stat}
  - value: 3.4
    errors:
    - {asymerror: {plus: 0.3, minus: -0.2}, label: syst}
  - value: 2.8
    errors:
    - {symerror: 5%, label: norm}
  - value: 0.9
";

/// Benchmark parsing a batch of references against a record context.
fn bench_parse_reference(c: &mut Criterion) {
    let context = PartialReference {
        reftype: Some("hepdata".to_string()),
        recordid: Some("12345".to_string()),
        recordversion: Some("2".to_string()),
        ..PartialReference::default()
    };

    let mut group = c.benchmark_group("reference");
    group.throughput(Throughput::Elements(REFERENCES.len() as u64));

    group.bench_function("parse_reference", |b| {
        b.iter(|| {
            for reference in REFERENCES {
                let parsed = parse_reference(black_box(*reference), &context).unwrap();
                black_box(parsed);
            }
        })
    });

    group.finish();
}

/// Benchmark parsing a table document.
fn bench_table_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_parse");
    group.throughput(Throughput::Bytes(TABLE_FIXTURE.len() as u64));

    group.bench_function("documents_from_str", |b| {
        b.iter(|| {
            let tables: Vec<RawTable> = documents_from_str(black_box(TABLE_FIXTURE)).unwrap();
            black_box(tables)
        })
    });

    group.finish();
}

/// Benchmark qualifier validation.
///
/// The table is parsed once outside the timed region.
fn bench_qualifier_validation(c: &mut Criterion) {
    let tables: Vec<RawTable> =
        documents_from_str(TABLE_FIXTURE).expect("Failed to parse table fixture");
    let table = &tables[0];
    let variable = &table.dependent_variables[0];
    let qualifiers = QualifierMap::from_raw(&variable.qualifiers);
    let independent: Vec<&str> = table
        .independent_variables
        .iter()
        .map(|v| v.header.name.as_str())
        .collect();

    let mut group = c.benchmark_group("qualifiers");
    group.bench_function("measurement_qualifiers", |b| {
        b.iter(|| {
            let parsed =
                MeasurementQualifiers::parse(black_box(&qualifiers), &independent, "xsec").unwrap();
            black_box(parsed)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_reference,
    bench_table_parse,
    bench_qualifier_validation,
);
criterion_main!(benches);
