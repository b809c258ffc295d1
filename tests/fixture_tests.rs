//! Every drawing under tests/fixtures is processed with the default
//! configuration. The file name ends in the status the document must get:
//! `*_full.svg`, `*_partial.svg` or `*_failed.svg`.

use datatest_stable::Utf8Path;
use ekgstore::{ExtractConfig, Pipeline, Status};

fn expected_status(path: &Utf8Path) -> Status {
    let stem = path.file_stem().unwrap_or_default();
    if stem.ends_with("_full") {
        Status::Full
    } else if stem.ends_with("_partial") {
        Status::Partial
    } else if stem.ends_with("_failed") {
        Status::Failed
    } else {
        panic!("fixture {path} does not name its expected status");
    }
}

fn test_fixture(path: &Utf8Path) -> datatest_stable::Result<()> {
    // Core events only exist with `--features tracing`; `RUST_LOG` picks them.
    #[cfg(feature = "tracing")]
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let source = std::fs::read_to_string(path)?;
    let pipeline = Pipeline::new(ExtractConfig::default())?;
    let id = path.file_stem().unwrap_or("fixture");
    let result = pipeline.process_source(id, &source);

    let expected = expected_status(path);
    assert_eq!(
        result.status, expected,
        "{path}: failures were {:#?}",
        result.failures
    );

    match result.status {
        Status::Full => assert!(result.failures.is_empty()),
        Status::Partial => assert!(!result.failures.is_empty()),
        Status::Failed => {
            assert!(result.waveforms.is_empty());
            assert_eq!(result.waveform_rows().count(), 0);
            assert!(
                result
                    .failures
                    .iter()
                    .any(|f| f.target == ekgstore::FailureTarget::Document),
                "{path}: a failed document needs a document-level failure"
            );
        }
    }

    let baseline = result.marker.map(|m| m.baseline_y);
    for waveform in &result.waveforms {
        assert!(
            waveform.samples.windows(2).all(|w| w[0].time < w[1].time),
            "{path}: lead {} times are not strictly increasing",
            waveform.lead
        );
        assert!(waveform.samples.len() >= 2);
    }
    if let Some(scale) = result.scale {
        assert!(scale.mv_per_px > 0.0 && scale.s_per_px > 0.0);
        assert!(baseline.is_some());
    }

    // Same drawing, same answer
    assert_eq!(pipeline.process_source(id, &source), result);
    Ok(())
}

datatest_stable::harness! {
    { test = test_fixture, root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"), pattern = r"\.svg$" },
}
