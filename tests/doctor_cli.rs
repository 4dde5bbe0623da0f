mod common;

use common::{awscan_cmd, make_temp_home};

#[cfg(unix)]
use common::{FAKE_AWS_FULL, write_fake_aws};

#[cfg(unix)]
#[test]
fn doctor_json_reports_caller_identity() {
    let home = make_temp_home("doctor-json");
    let bin = write_fake_aws(&home, FAKE_AWS_FULL);

    let out = awscan_cmd(&home)
        .env("AWSCAN_SCAN_AWS_BIN", &bin)
        .args(["doctor", "--json"])
        .output()
        .expect("run awscan");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert!(
        v["aws_cli"]
            .as_str()
            .is_some_and(|s| s.starts_with("aws-cli/")),
        "v={v}"
    );
    assert_eq!(v["identity"]["Account"], "123456789012");
    assert_eq!(
        v["identity"]["Arn"],
        "arn:aws:iam::123456789012:user/scan"
    );

    let _ = std::fs::remove_dir_all(&home);
}

#[cfg(unix)]
#[test]
fn doctor_text_reports_connection() {
    let home = make_temp_home("doctor-text");
    let bin = write_fake_aws(&home, FAKE_AWS_FULL);

    let out = awscan_cmd(&home)
        .env("AWSCAN_SCAN_AWS_BIN", &bin)
        .arg("doctor")
        .output()
        .expect("run awscan");
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("接続: OK"), "stdout={stdout}");
    assert!(stdout.contains("123456789012"), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn doctor_with_missing_aws_cli_exits_20() {
    let home = make_temp_home("doctor-missing");

    let out = awscan_cmd(&home)
        .env(
            "AWSCAN_SCAN_AWS_BIN",
            home.join("does-not-exist/aws").to_str().expect("utf8 path"),
        )
        .arg("doctor")
        .output()
        .expect("run awscan");
    assert_eq!(out.status.code(), Some(20));

    let _ = std::fs::remove_dir_all(&home);
}
