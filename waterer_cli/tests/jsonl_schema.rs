use assert_cmd::Command;
use rstest::rstest;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

const STATE: &str = "garden/pump";
const SET: &str = "garden/pump/set";
const AVAIL: &str = "garden/pump/availability";

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = format!(
        r#"
[pins]
pump = 0
flow_meter = 1

[mqtt]
host = "127.0.0.1"
client_id = "test-waterer"

[topics]
state = "{STATE}"
set = "{SET}"
availability = "{AVAIL}"

[flow_meter]
pulses_per_liter = 1000.0

[simulation]
enabled = true
pulses_per_tick = 20

[runner]
loop_interval_ms = 1
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("bad line {l:?}: {e}")))
        .collect()
}

/// Validate the JSONL schema for a successful dose run.
#[rstest]
fn jsonl_dose_success_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("waterer").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("dose")
        .arg("--ml")
        .arg("60");

    let out = cmd.assert().success().get_output().stdout.clone();
    let lines = json_lines(&out);
    let v = lines
        .iter()
        .find(|v| v.get("dispensed_ml").is_some())
        .expect("summary line");

    assert!(v.get("timestamp").and_then(Value::as_u64).is_some());
    assert_eq!(v["target_ml"].as_f64(), Some(60.0));
    assert!(v["dispensed_ml"].as_f64().unwrap() >= 60.0);
    assert!(v.get("duration_ms").and_then(Value::as_u64).is_some());
    assert_eq!(v["simulated"], true);
    assert!(v["abort_reason"].is_null());
}

/// Validate the structured error line for a config failure.
#[rstest]
fn jsonl_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("waterer").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("dose")
        .arg("--ml=-1");

    let out = cmd.assert().code(4).get_output().stdout.clone();
    let lines = json_lines(&out);

    let summary = lines
        .iter()
        .find(|v| v.get("dispensed_ml").is_some())
        .expect("summary line");
    assert!(summary["dispensed_ml"].is_null());
    assert_eq!(summary["abort_reason"], "Config");

    let err = lines
        .iter()
        .find(|v| v.get("message").is_some())
        .expect("error line");
    assert_eq!(err["reason"], "Config");
    assert_eq!(err["exit_code"], 4);
}

/// Drive the station over stdin and check the published protocol.
#[rstest]
fn run_publishes_protocol_lines() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let input = [
        "not json",
        r#"{"state":"ON","volume":100}"#,
    ]
    .join("\n");

    let mut cmd = Command::cargo_bin("waterer").unwrap();
    cmd.arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .write_stdin(input);

    let out = cmd.assert().success().get_output().stdout.clone();
    let lines = json_lines(&out);

    for l in &lines {
        assert!(l["topic"].is_string());
        assert!(l["retain"].is_boolean());
        assert!(l["payload"].is_string());
    }

    // announce first
    assert_eq!(lines[0]["topic"], AVAIL);
    assert_eq!(lines[0]["payload"], "online");
    assert_eq!(lines[0]["retain"], true);
    assert_eq!(lines[1]["topic"], STATE);

    let statuses: Vec<Value> = lines
        .iter()
        .filter(|l| l["topic"] == STATE)
        .map(|l| serde_json::from_str(l["payload"].as_str().unwrap()).unwrap())
        .collect();
    for s in &statuses {
        assert_eq!(s.as_object().unwrap().len(), 3);
    }
    // the malformed line is never acknowledged; the valid one is, immediately
    assert_eq!(
        statuses[1],
        serde_json::json!({"state":"ON","volumeTarget":100.0,"volumeCurrent":0.0})
    );
    assert_eq!(
        statuses.last().unwrap(),
        &serde_json::json!({"state":"OFF","volumeTarget":100.0,"volumeCurrent":0.0})
    );

    let last = lines.last().unwrap();
    assert_eq!(last["topic"], AVAIL);
    assert_eq!(last["payload"], "offline");
}
