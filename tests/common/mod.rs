#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use hepref::config::{ArchiveEndpoints, ResolverConfig};
use hepref::fetch::{HttpResponse, ResponseHead, Transport};
use hepref::HepRefError;
use url::Url;
use zip::write::SimpleFileOptions;

pub const BASE_URL: &str = "http://hepdata.test/";

pub fn config(root: &Path) -> ResolverConfig {
    ResolverConfig::new(root)
        .with_endpoints(ArchiveEndpoints::new(BASE_URL).expect("valid base url"))
}

pub fn metadata_url(sandbox: bool, recordid: &str) -> String {
    if sandbox {
        format!("{BASE_URL}record/sandbox/{recordid}?format=json")
    } else {
        format!("{BASE_URL}record/{recordid}?format=json")
    }
}

pub fn archive_url(recordid: &str, version: u64) -> String {
    format!("{BASE_URL}download/submission/{recordid}/{version}/original")
}

pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer
            .write_all(contents.as_bytes())
            .expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// In-memory transport serving canned responses and recording every request.
///
/// Unknown URLs get a 404 HTML page, like the real archive.
#[derive(Default)]
pub struct MockTransport {
    responses: HashMap<String, HttpResponse>,
    requests: RefCell<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, status: u16, content_type: &str, body: Vec<u8>) -> Self {
        self.responses.insert(
            url.to_string(),
            HttpResponse {
                head: ResponseHead {
                    status,
                    content_type: Some(content_type.to_string()),
                },
                body,
            },
        );
        self
    }

    pub fn with_metadata(self, sandbox: bool, recordid: &str, version: u64) -> Self {
        let body = serde_json::json!({ "recid": recordid, "version": version }).to_string();
        self.with_response(
            &metadata_url(sandbox, recordid),
            200,
            "application/json",
            body.into_bytes(),
        )
    }

    pub fn with_archive(self, recordid: &str, version: u64, entries: &[(&str, &str)]) -> Self {
        self.with_response(
            &archive_url(recordid, version),
            200,
            "application/zip",
            zip_bytes(entries),
        )
    }

    /// Serve a published record: metadata plus the archive of `version`.
    pub fn with_record(self, recordid: &str, version: u64, entries: &[(&str, &str)]) -> Self {
        self.with_metadata(false, recordid, version)
            .with_archive(recordid, version, entries)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &Url) -> Result<HttpResponse, HepRefError> {
        self.requests.borrow_mut().push(url.to_string());
        Ok(self
            .responses
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| HttpResponse {
                head: ResponseHead {
                    status: 404,
                    content_type: Some("text/html; charset=utf-8".to_string()),
                },
                body: b"<html>not found</html>".to_vec(),
            }))
    }
}

/// Write an already extracted record into a cache root.
pub fn write_record(
    root: &Path,
    reftype: &str,
    recordid: &str,
    version: u64,
    entries: &[(&str, &str)],
) -> PathBuf {
    let record = root
        .join(reftype)
        .join(recordid)
        .join(format!("HEPData-{recordid}-v{version}"));
    fs::create_dir_all(&record).expect("create record dir");
    for (name, contents) in entries {
        fs::write(record.join(name), contents).expect("write record file");
    }
    record
}

// ============================================================================
// Fixture records
// ============================================================================

pub const MEASUREMENT_MANIFEST: &str = "\
---
comment: Example neutrino cross-section release
additional_resources:
- {location: analysis.cxx, description: Selection and projection functions}
- {location: missing.root, description: Not shipped with the archive}
---
name: Table1
description: CC-inclusive cross-section
data_file: Table1.yaml
---
name: Combined
description: Combination of all channels
data_file: Combined.yaml
";

pub const TABLE1: &str = "\
independent_variables:
- header: {name: Enu, units: GeV}
  values:
  - {low: 0.0, high: 1.0}
  - {low: 1.0, high: 2.0}
dependent_variables:
- header: {name: xsec, units: 10E-38cm2}
  qualifiers:
  - {name: variable_type, value: cross_section_measurement}
  - {name: selectfunc, value: 'analysis.cxx:SelectCCInc'}
  - {name: 'Enu:projectfunc', value: 'analysis.cxx:ProjectEnu'}
  - {name: target, value: CH}
  - {name: probe_flux, value: '300v1/Flux:numu'}
  - {name: errors, value: '300v1/Covariance'}
  - {name: Experiment, value: EXAMPLE}
  values:
  - value: 1.2
    errors:
    - {symerror: 0.1, label: stat}
  - value: 3.4
    errors:
    - {asymerror: {plus: 0.3, minus: -0.2}, label: syst}
";

pub const COMBINED: &str = "\
independent_variables:
- header: {name: Enu, units: GeV}
  values:
  - {low: 0.0, high: 1.0}
  - {low: 1.0, high: 2.0}
dependent_variables:
- header: {name: combined}
  qualifiers:
  - {name: variable_type, value: composite_cross_section_measurement}
  - {name: sub_measurements, value: '/Table1:xsec'}
  - {name: test_statistic, value: shape_only_chi2}
  values:
  - {value: 1.2}
  - {value: 3.4}
";

pub const FLUX_MANIFEST: &str = "\
---
comment: Beam flux and covariance
---
name: Flux
data_file: Flux.yaml
---
name: Covariance
data_file: Covariance.yaml
";

pub const FLUX: &str = "\
independent_variables:
- header: {name: Enu, units: GeV}
  values:
  - {low: 0.0, high: 1.0}
  - {low: 1.0, high: 2.0}
dependent_variables:
- header: {name: numu}
  qualifiers:
  - {name: variable_type, value: probe_flux}
  - {name: probe_particle, value: numu}
  - {name: bin_content_type, value: count_density}
  values:
  - {value: 100.0}
  - {value: 40.0}
";

pub const COVARIANCE: &str = "\
independent_variables:
- header: {name: bin_i}
  values: [{value: 0}, {value: 0}, {value: 1}, {value: 1}]
- header: {name: bin_j}
  values: [{value: 0}, {value: 1}, {value: 0}, {value: 1}]
dependent_variables:
- header: {name: cov}
  qualifiers:
  - {name: variable_type, value: error_table}
  - {name: error_type, value: covariance}
  values: [{value: 0.01}, {value: 0.002}, {value: 0.002}, {value: 0.04}]
";

pub fn measurement_record() -> Vec<(&'static str, &'static str)> {
    vec![
        ("submission.yaml", MEASUREMENT_MANIFEST),
        ("Table1.yaml", TABLE1),
        ("Combined.yaml", COMBINED),
        ("analysis.cxx", "// selection functions\n"),
    ]
}

pub fn flux_record() -> Vec<(&'static str, &'static str)> {
    vec![
        ("submission.yaml", FLUX_MANIFEST),
        ("Flux.yaml", FLUX),
        ("Covariance.yaml", COVARIANCE),
    ]
}

/// Transport serving the measurement record 12345 (v2) and flux record 300 (v1).
pub fn archive_with_fixtures() -> MockTransport {
    MockTransport::new()
        .with_record("12345", 2, &measurement_record())
        .with_record("300", 1, &flux_record())
}

/// Cache root with both fixture records already extracted.
pub fn populated_cache(root: &Path) {
    write_record(root, "hepdata", "12345", 2, &measurement_record());
    write_record(root, "hepdata", "300", 1, &flux_record());
}
