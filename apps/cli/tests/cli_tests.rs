//! innova-cli 命令行集成测试

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

/// 使用隔离配置文件的命令
fn cli(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("innova-cli").unwrap();
    cmd.env("INNOVA_CONFIG", config_dir.path().join("config.toml"));
    cmd
}

fn capture(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_parse_text_output() {
    let dir = TempDir::new().unwrap();
    let file = capture(&[
        "s1;0xAB3311",
        "s2;0xAC4312",
        "END_PACKET",
        "garbage",
        "s1;0xEF0112",
        "END_PACKET",
        "s3;0xBA3311",
    ]);

    cli(&dir)
        .arg("parse")
        .arg(file.path())
        .arg("--classify")
        .assert()
        .success()
        .stdout(predicate::str::contains("packet #1 (2 readings)"))
        .stdout(predicate::str::contains("s2;0xAC4312 [Sitting]"))
        .stdout(predicate::str::contains("packet #2 (1 readings)"))
        .stdout(predicate::str::contains("s1;0xEF0112 [Falling]"))
        .stdout(predicate::str::contains(
            "2 packets, 3 readings, 1 malformed lines, 1 unterminated readings discarded",
        ));
}

#[test]
fn test_parse_json_output() {
    let dir = TempDir::new().unwrap();
    let file = capture(&["s1;0xAB3311", "END_PACKET"]);

    let output = cli(&dir)
        .arg("parse")
        .arg(file.path())
        .args(["--json", "--classify", "--address", "AA:BB"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);

    let packet: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(packet["device_address"], "AA:BB");
    assert_eq!(packet["sequence"], 1);
    assert_eq!(packet["readings"][0]["sensor_id"], "s1");
    assert_eq!(packet["readings"][0]["code"], "0xAB3311");
    assert_eq!(packet["readings"][0]["posture"], "Standing");
}

#[test]
fn test_parse_from_stdin_with_crlf() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("parse")
        .write_stdin("s1;0xAB3311\r\nEND_PACKET\r\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("packet #1 (1 readings)"))
        .stdout(predicate::str::contains("s1;0xAB3311"));
}

#[test]
fn test_parse_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["parse", "/definitely/not/here.txt"])
        .assert()
        .failure();
}

#[test]
fn test_classify_codes() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["classify", "0xAC4312", "0xab3311"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0xAC4312\tSitting\tcalories=2"))
        .stdout(predicate::str::contains("0xab3311\tUnknown\tcalories=0"))
        .stdout(predicate::str::contains("video=-"));
}

#[test]
fn test_classify_json() {
    let dir = TempDir::new().unwrap();
    let output = cli(&dir)
        .args(["classify", "--json", "0xEF0112"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_str(String::from_utf8(output.stdout).unwrap().trim()).unwrap();
    assert_eq!(value["posture"], "Falling");
    assert_eq!(value["calories"], 10);
    assert_eq!(value["video"], "cadere_video");
}

#[test]
fn test_classify_requires_code() {
    let dir = TempDir::new().unwrap();
    cli(&dir).arg("classify").assert().failure();
}

#[test]
fn test_energy_summary() {
    let dir = TempDir::new().unwrap();
    let file = capture(&[
        "0xAC4312",
        "1700000000000\ts1;0xEF0112",
        "s2;0xAC4312",
        "END_PACKET",
        "0xAB3311",
    ]);

    cli(&dir)
        .arg("energy")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Sitting"))
        .stdout(predicate::str::contains("Falling"))
        .stdout(predicate::str::contains("total: 4 readings, 14 calories"));
}

#[test]
fn test_energy_filtered_by_sensor() {
    let dir = TempDir::new().unwrap();
    let file = capture(&["s1;0xAC4312", "s2;0xEF0112", "s1;0xAC4312"]);

    let output = cli(&dir)
        .arg("energy")
        .arg(file.path())
        .args(["--sensor", "s1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["total_readings"], 2);
    assert_eq!(value["total_calories"], 4);
}

#[test]
fn test_config_set_get_path() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    cli(&dir)
        .args(["config", "set", "--device", "/dev/rfcomm0", "--owner", "alice"])
        .assert()
        .success();

    cli(&dir)
        .args(["config", "get", "device"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/dev/rfcomm0"));

    cli(&dir)
        .args(["config", "get"])
        .assert()
        .success()
        .stdout(predicate::str::contains("owner = alice"))
        .stdout(predicate::str::contains("tcp = (unset)"));

    cli(&dir).args(["config", "get", "colour"]).assert().failure();
}

#[test]
fn test_config_set_requires_option() {
    let dir = TempDir::new().unwrap();
    cli(&dir).args(["config", "set"]).assert().failure();
}

#[test]
fn test_monitor_device_file_until_eof() {
    let dir = TempDir::new().unwrap();
    let file = capture(&[
        "s1;0xAC4312",
        "s2;0xEF0112",
        "END_PACKET",
        "s1;0xAB3311",
        "END_PACKET",
    ]);
    let records = dir.path().join("records.jsonl");

    cli(&dir)
        .arg("monitor")
        .arg("--device")
        .arg(file.path())
        .args(["--address", "00:11:22:33:44:55", "--owner", "alice"])
        .arg("--records")
        .arg(&records)
        .assert()
        .success()
        .stdout(predicate::str::contains("connected: 00:11:22:33:44:55"))
        .stdout(predicate::str::contains("Packet #1: 2 readings"))
        .stdout(predicate::str::contains("FALL DETECTED"))
        .stdout(predicate::str::contains("end of stream"))
        .stdout(predicate::str::contains("2 packets, 3 records, 12 calories"));

    let content = std::fs::read_to_string(&records).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["device_address"], "00:11:22:33:44:55");
    assert_eq!(record["owner_id"], "alice");
    assert_eq!(record["sensor_id"], "s1");
}

#[test]
fn test_monitor_uses_configured_device_and_raw_log() {
    let dir = TempDir::new().unwrap();
    let file = capture(&["s1;0xAB3311", "END_PACKET"]);
    let raw_log = dir.path().join("raw.log");

    cli(&dir)
        .args(["config", "set", "--device"])
        .arg(file.path())
        .assert()
        .success();

    cli(&dir)
        .arg("monitor")
        .arg("--raw-log")
        .arg(&raw_log)
        .assert()
        .success()
        .stdout(predicate::str::contains("raw log: 2 lines written, 0 dropped"));

    let content = std::fs::read_to_string(&raw_log).unwrap();
    assert!(content.lines().any(|l| l.ends_with("\ts1;0xAB3311")));
    assert!(content.lines().any(|l| l.ends_with("\tEND_PACKET")));
}

#[test]
fn test_monitor_without_device_fails() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("monitor")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no device selected"));
}
