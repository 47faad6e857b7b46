use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// Minimal config for the simulated board; calibration polls fast so
// console calibration finishes quickly.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let cal = dir.path().join("rail_calibration.toml");
    let toml = format!(
        r#"
[calibration]
file = "{}"
poll_ms = 5
settle_timeout_ms = 10000

[bus]
settle_ns = 0
"#,
        cal.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn antctl(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("antctl").unwrap();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(write_valid_config(dir))
        .arg("--log-level")
        .arg("warn");
    cmd
}

fn console(dir: &tempfile::TempDir, input: &str) -> assert_cmd::assert::Assert {
    let mut cmd = antctl(dir);
    cmd.args(["console", "--no-scheduler"]).write_stdin(input.to_string());
    cmd.assert()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["wiring"], 0, "    2   33  AZ_01", "stdout")]
#[case(&["wiring"], 0, "unrouted pins: 19, 36", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let assert = antctl(&dir).args(args).assert().code(exit_code);
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

#[test]
fn wiring_json_lists_swapped_groups() {
    let dir = tempdir().unwrap();
    let out = antctl(&dir)
        .args(["--json", "wiring", "--swaps"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["fields"]["FM"], serde_json::json!([33, 39, 38, 36]));
    assert_eq!(v["stages"].as_array().unwrap().len(), 48);
    assert_eq!(v["corrections"].as_array().unwrap().len(), 1);
}

#[rstest]
#[case::set_then_read("setfield EL 3\nreadfield EL\n", "EL = 3")]
#[case::several_fields("setfield AZ 0x123456 SS 17\nreadfield\n", "SS = 17")]
#[case::out_of_range_keeps_chain("setfield EL 4\nreadfield EL\n", "EL = 0")]
#[case::unknown_field("setfield XY 1\n", "Error: unknown field")]
#[case::unknown_command("frobnicate\n", "Unknown command 'frobnicate'")]
#[case::raw_write("cpld_write 0x1\n", "Read-back bits: 1000")]
#[case::target("setvolt fixed 3.0\nreadvolt fixed\n", "(target: 3.00 V)")]
#[case::target_out_of_range("setvolt fixed 4.5\n", "Error:")]
#[case::manual_wiper("setres 0 100\ndebugvolt adjustable\n", "wiper=100, auto=false")]
#[case::fan("setfan 50\n", "Fan speed set to 50%")]
#[case::mode("readmode\n", "Mode: 0")]
#[case::antenna("antenna\n", "Antenna sense: 0")]
#[case::help("help\n", "calibrate_all")]
fn console_commands(#[case] input: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    console(&dir, input)
        .success()
        .stdout(predicate::str::contains(needle))
        .stdout(predicate::str::contains("Exiting command listener."));
}

#[test]
fn console_keeps_running_after_a_failed_command() {
    let dir = tempdir().unwrap();
    console(&dir, "setfield EL 9\nsetfield EL 2\nreadfield EL\n")
        .success()
        .stdout(predicate::str::contains("Error:"))
        .stdout(predicate::str::contains("EL = 2"));
}

#[test]
fn console_calibration_prompts_and_persists() {
    let dir = tempdir().unwrap();
    console(&dir, "calibrate adjustable\n3.0\n9.0\n")
        .success()
        .stdout(predicate::str::contains("Enter measured voltage"))
        .stdout(predicate::str::contains("adjustable calibrated"));
    let stored = fs::read_to_string(dir.path().join("rail_calibration.toml")).unwrap();
    assert!(stored.contains("[adjustable]"), "{stored}");
}

#[test]
fn calibration_aborts_when_input_ends() {
    let dir = tempdir().unwrap();
    console(&dir, "calibrate fixed\n")
        .success()
        .stdout(predicate::str::contains("Error:"));
    assert!(!dir.path().join("rail_calibration.toml").exists());
}

#[test]
fn shutdown_ends_the_console() {
    let dir = tempdir().unwrap();
    console(&dir, "shutdown\nreadmode\n")
        .success()
        .stdout(predicate::str::contains("Shutting down."))
        .stdout(predicate::str::contains("Mode:").not());
}

#[test]
fn invalid_config_is_humanized() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[control]\nalpha = 2.0\n").unwrap();
    Command::cargo_bin("antctl")
        .unwrap()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&cfg)
        .arg("wiring")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains("control.alpha"));
}

#[test]
fn missing_config_reports_json_error() {
    let dir = tempdir().unwrap();
    let out = Command::cargo_bin("antctl")
        .unwrap()
        .current_dir(dir.path())
        .args(["--json", "--config", "nope.toml", "self-check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let last = String::from_utf8_lossy(&out.stderr)
        .lines()
        .last()
        .unwrap()
        .to_string();
    let v: serde_json::Value = serde_json::from_str(&last).unwrap();
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("could not be read"));
}
