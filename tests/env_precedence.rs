mod common;

use common::{awscan_cmd, make_temp_home, write_file};

#[cfg(unix)]
use common::{FAKE_AWS_FULL, write_fake_aws};

#[cfg(unix)]
#[test]
fn env_export_dir_overrides_config_file() {
    let home = make_temp_home("env-exportdir");
    let bin = write_fake_aws(&home, FAKE_AWS_FULL);
    let file_dir = home.join("from-file");
    let env_dir = home.join("from-env");
    write_file(
        &home.join(".config/awscan/config.toml"),
        format!(
            r#"
[scan]
export_dir = "{}"
"#,
            file_dir.display()
        )
        .as_bytes(),
    );

    let out = awscan_cmd(&home)
        .env("AWSCAN_SCAN_AWS_BIN", &bin)
        .env("AWSCAN_SCAN_EXPORT_DIR", &env_dir)
        .args(["scan", "--no-alert"])
        .output()
        .expect("run awscan");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(env_dir.join("public_s3_buckets.csv").exists());
    assert!(!file_dir.exists());

    let _ = std::fs::remove_dir_all(&home);
}

#[cfg(unix)]
#[test]
fn env_aws_bin_overrides_config_file() {
    let home = make_temp_home("env-awsbin");
    let bin = write_fake_aws(&home, FAKE_AWS_FULL);
    write_file(
        &home.join(".config/awscan/config.toml"),
        br#"
[scan]
aws_bin = "/nonexistent/aws"
"#,
    );

    let out = awscan_cmd(&home)
        .env("AWSCAN_SCAN_AWS_BIN", &bin)
        .args(["scan", "--json", "--no-alert", "--no-export"])
        .output()
        .expect("run awscan");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn env_config_path_selects_the_config_file() {
    let home = make_temp_home("env-configpath");
    let custom = home.join("elsewhere/awscan.toml");
    write_file(
        &custom,
        br#"
[ui]
max_table_rows = 7
"#,
    );

    let out = awscan_cmd(&home)
        .env("AWSCAN_CONFIG", &custom)
        .args(["config", "--show"])
        .output()
        .expect("run awscan");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("max_table_rows = 7"), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_bool_exits_2() {
    let home = make_temp_home("env-badbool");
    let out = awscan_cmd(&home)
        .env("AWSCAN_UI_COLOR", "banana")
        .args(["config", "--show"])
        .output()
        .expect("run awscan");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}
