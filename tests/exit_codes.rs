mod common;

use common::{awscan_cmd, make_temp_home, write_file};

#[test]
fn completion_unknown_shell_exits_2() {
    let home = make_temp_home("exit-completion");
    let out = awscan_cmd(&home)
        .args(["completion", "nope"])
        .output()
        .expect("run awscan");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn completion_bash_emits_a_script() {
    let home = make_temp_home("exit-completion-ok");
    let out = awscan_cmd(&home)
        .args(["completion", "bash"])
        .output()
        .expect("run awscan");
    assert!(out.status.success());
    assert!(!out.stdout.is_empty());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn ui_requires_tty_exits_2() {
    let home = make_temp_home("exit-ui");
    let out = awscan_cmd(&home).arg("ui").output().expect("run awscan");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn ui_rejects_json_exits_2() {
    let home = make_temp_home("exit-ui-json");
    let out = awscan_cmd(&home)
        .args(["--json", "ui"])
        .output()
        .expect("run awscan");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn broken_config_file_exits_2() {
    let home = make_temp_home("exit-config");
    write_file(
        &home.join(".config/awscan/config.toml"),
        b"[ui\ncolor = maybe",
    );
    let out = awscan_cmd(&home)
        .args(["config", "--show"])
        .output()
        .expect("run awscan");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}
