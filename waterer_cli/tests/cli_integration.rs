use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid TOML config; the sim backend ignores the pins but they must be present
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
pump = 0
flow_meter = 1

[mqtt]
host = "127.0.0.1"

[flow_meter]
pulses_per_liter = 1000.0

[simulation]
enabled = true
pulses_per_tick = 50

[runner]
loop_interval_ms = 1
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["dose", "--ml", "100"], 0, "dose complete: 100.0 ml", "stdout")]
#[case(&["dose", "--ml", "0"], 0, "dose complete: 0.0 ml", "stdout")]
#[case(&["dose"], 2, "required", "stderr")]
#[case(&["dose", "--ml=-5"], 4, "--ml must be", "stderr")]
#[case(&["self-check"], 0, "ok", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("waterer").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);
    cmd.args(args);

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "100,0.0").unwrap();

    let mut cmd = Command::cargo_bin("waterer").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check");

    cmd.assert()
        .code(4)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn calibration_csv_overrides_config() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    // 500 pulses per liter: twice the config's volume per pulse
    let csv = dir.path().join("calib.csv");
    fs::write(&csv, "pulses,ml\n500,1000\n250,500\n").unwrap();

    let mut cmd = Command::cargo_bin("waterer").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&csv)
        .args(["dose", "--ml", "100"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("dose complete: 100.0 ml"));
}

#[rstest]
#[case("[pins]\npump = 3\nflow_meter = 3\n[mqtt]\nhost = \"h\"\n", "must differ")]
#[case("[pins]\npump = 0\nflow_meter = 1\n", "mqtt")]
#[case("not toml at all", "parse")]
fn invalid_config_exits_with_config_code(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();

    let mut cmd = Command::cargo_bin("waterer").unwrap();
    cmd.arg("--config").arg(&path).arg("self-check");
    cmd.assert()
        .code(4)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn missing_config_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("waterer").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check");
    cmd.assert().code(4);
}
