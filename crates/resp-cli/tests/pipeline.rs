use assert_cmd::cargo::cargo_bin_cmd;
use resp_lib::metrics::mo2::CycleSummary;
use serde_json::Value;
use std::{error::Error, fs, path::PathBuf};
use tempfile::tempdir;

#[test]
fn analyze_writes_summary_table() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("resp");
    cmd.args([
        "analyze",
        "--input",
        &sample_path("test_data/oxyview_sample.txt"),
        "--start-date",
        "14/03/16",
        "--start-time",
        "10:00:00",
        "--cycle",
        "2:00",
        "--volume",
        "5",
        "--mass",
        "0.45",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("slope,R2,start,MO2,mass,meanTemp,sdTemp"));
    assert_eq!(lines.count(), 3);

    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let rows: Vec<CycleSummary> = reader.deserialize().collect::<Result<_, _>>()?;
    assert_eq!(rows[0].start, "14/03/16 10:00:00");
    assert_eq!(rows[1].start, "14/03/16 10:02:01");
    assert_eq!(rows[2].start, "14/03/16 10:04:01");
    assert_close(rows[0].slope, -0.002, 1e-9);
    assert_close(rows[0].mo2, 72.8, 1e-6);
    assert_close(rows[0].mass, 0.45, 1e-12);
    Ok(())
}

#[test]
fn analyze_reads_config_file_and_writes_out() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let out = temp.path().join("results.csv");
    let mut cmd = cargo_bin_cmd!("resp");
    cmd.args([
        "analyze",
        "--input",
        &sample_path("test_data/oxyview_sample.txt"),
        "--config",
        &sample_path("test_data/experiment.toml"),
        "--population-sd",
        "--out",
        out.to_str().expect("utf8 path"),
    ]);
    cmd.assert().success();
    let contents = fs::read_to_string(&out)?;
    assert!(contents.starts_with("slope,R2,start,MO2,mass,meanTemp,sdTemp\n"));
    assert_eq!(contents.lines().count(), 4);
    Ok(())
}

#[test]
fn analyze_json_reports_trailing_cycle() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("resp");
    cmd.args([
        "analyze",
        "--input",
        &sample_path("test_data/oxyview_sample.txt"),
        "--config",
        &sample_path("test_data/experiment.toml"),
        "--json",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let json: Value = serde_json::from_slice(&output)?;
    assert_eq!(json["trailing_samples"], 30);
    assert_eq!(json["skipped_lines"], 4);
    assert_eq!(json["filled_seconds"]["1"], 2);
    assert_eq!(json["summaries"]["0"]["start"], "14/03/16 10:00:00");
    Ok(())
}

#[test]
fn analyze_rejects_bad_parameters() {
    let mut cmd = cargo_bin_cmd!("resp");
    cmd.args([
        "analyze",
        "--input",
        &sample_path("test_data/oxyview_sample.txt"),
        "--config",
        &sample_path("test_data/experiment.toml"),
        "--start-time",
        "10h00",
    ]);
    cmd.assert().failure();

    let mut cmd = cargo_bin_cmd!("resp");
    cmd.args([
        "analyze",
        "--input",
        &sample_path("test_data/oxyview_sample.txt"),
        "--start-date",
        "14/03/16",
        "--start-time",
        "10:00:00",
        "--cycle",
        "2:00",
        "--volume",
        "5",
    ]);
    cmd.assert().failure();

    let mut cmd = cargo_bin_cmd!("resp");
    cmd.args([
        "analyze",
        "--input",
        &sample_path("test_data/oxyview_sample.txt"),
        "--config",
        &sample_path("test_data/experiment.toml"),
        "--cycle",
        "80000000:00",
    ]);
    cmd.assert().failure();
}

fn assert_close(a: f64, b: f64, tol: f64) {
    let diff = (a - b).abs();
    assert!(
        diff <= tol,
        "diff {} exceeded tol {} ({} vs {})",
        diff,
        tol,
        a,
        b
    );
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn sample_path(relative: &str) -> String {
    workspace_root()
        .join(relative)
        .to_string_lossy()
        .to_string()
}
