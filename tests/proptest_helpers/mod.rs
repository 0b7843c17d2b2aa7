#![allow(dead_code)]

use hepref::ReferenceComponents;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_reftype() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("hepdata".to_string()),
        Just("hepdata-sandbox".to_string()),
        Just("inspirehep".to_string()),
        "[a-z][a-z-]{0,11}",
    ]
}

pub fn arb_recordid() -> impl Strategy<Value = String> {
    (1u64..100_000_000).prop_map(|id| id.to_string())
}

pub fn arb_version() -> impl Strategy<Value = String> {
    (1u32..1000).prop_map(|v| v.to_string())
}

/// Resource names start with a letter, so they never read as record ids.
pub fn arb_resource() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_.]{0,15}"
}

pub fn arb_qualifier() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,11}"
}

/// Components whose qualifier is only set alongside a resource name.
pub fn arb_components() -> BoxedStrategy<ReferenceComponents> {
    (
        arb_reftype(),
        arb_recordid(),
        proptest::option::of(arb_version()),
        proptest::option::of((arb_resource(), proptest::option::of(arb_qualifier()))),
    )
        .prop_map(|(reftype, recordid, recordversion, resource)| {
            let (resourcename, qualifier) = match resource {
                Some((name, qualifier)) => (Some(name), qualifier),
                None => (None, None),
            };
            ReferenceComponents {
                reftype,
                recordid,
                recordversion,
                resourcename,
                qualifier,
            }
        })
        .boxed()
}
