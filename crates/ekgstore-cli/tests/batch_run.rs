//! Runs the `ekgstore` binary over the library's SVG fixtures.

use std::process::Command;

use camino::Utf8PathBuf;

fn fixtures() -> Utf8PathBuf {
    Utf8PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures"))
}

#[test]
fn svg_fixtures_end_to_end() {
    let out = tempfile::tempdir().unwrap();
    let out = Utf8PathBuf::from_path_buf(out.path().to_path_buf()).unwrap();

    let run = Command::new(env!("CARGO_BIN_EXE_ekgstore"))
        .args(["-i", &format!("{}/*.svg", fixtures()), "-o", out.as_str()])
        .args(["-x", "--no-progress", "-j", "2"])
        .output()
        .unwrap();
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));

    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("Total: 5"), "{stdout}");
    assert!(stdout.contains("Errored: 2"), "{stdout}");

    assert!(out.join("twelve_lead_full.csv").is_file());
    assert!(out.join("twelve_lead_full_meta.csv").is_file());
    assert!(out.join("missing_v6_partial.csv").is_file());
    assert!(!out.join("no_marker_failed.csv").exists());
    assert!(!out.join("broken_path_failed.csv").exists());

    let waves = std::fs::read_to_string(out.join("twelve_lead_full.csv")).unwrap();
    assert!(waves.starts_with("document_id,lead,time_s,amplitude_mv\n"));
    assert!(waves.lines().any(|l| l.starts_with("twelve_lead_full,V6,")));
}

#[test]
fn output_path_that_is_a_file_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let taken = dir.path().join("output");
    std::fs::write(&taken, "").unwrap();

    let run = Command::new(env!("CARGO_BIN_EXE_ekgstore"))
        .args(["-i", &format!("{}/*.svg", fixtures())])
        .arg("-o")
        .arg(&taken)
        .args(["-x", "--no-progress"])
        .output()
        .unwrap();
    assert!(!run.status.success());
    assert!(String::from_utf8_lossy(&run.stderr).contains("output_not_directory"));
}
