#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

pub fn awscan_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_awscan"));
    cmd.current_dir(home);
    cmd.env("HOME", home);
    cmd.env_remove("AWSCAN_CONFIG");
    cmd.env_remove("AWSCAN_UI_COLOR");
    cmd.env_remove("AWSCAN_UI_MAX_TABLE_ROWS");
    cmd.env_remove("AWSCAN_SCAN_AWS_BIN");
    cmd.env_remove("AWSCAN_SCAN_PROFILE");
    cmd.env_remove("AWSCAN_SCAN_REGION");
    cmd.env_remove("AWSCAN_SCAN_EXPORT_DIR");
    cmd.env_remove("AWSCAN_ALERT_WEBHOOK_URL");
    cmd.env_remove("AWSCAN_ALERT_EMAIL_PASSWORD");
    cmd
}

pub fn make_temp_home(tag: &str) -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("awscan-{tag}-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

#[cfg(unix)]
pub fn write_fake_aws(home: &Path, script_body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let bin = home.join("bin/aws");
    write_file(&bin, script_body.as_bytes());
    let mut perms = std::fs::metadata(&bin).expect("stat").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&bin, perms).expect("chmod");
    bin
}

#[cfg(unix)]
pub const FAKE_AWS_FULL: &str = r#"#!/bin/sh
case "$*" in
  *"sts get-caller-identity"*)
    echo '{"UserId": "AIDAEXAMPLE", "Account": "123456789012", "Arn": "arn:aws:iam::123456789012:user/scan"}' ;;
  *"s3api list-buckets"*)
    echo '{"Buckets": [{"Name": "public-data"}, {"Name": "private-data"}]}' ;;
  *"s3api get-bucket-acl"*"public-data"*)
    echo '{"Grants": [{"Grantee": {"Type": "Group", "URI": "http://acs.amazonaws.com/groups/global/AllUsers"}, "Permission": "READ"}]}' ;;
  *"s3api get-bucket-acl"*)
    echo '{"Grants": [{"Grantee": {"Type": "CanonicalUser", "ID": "abc"}, "Permission": "FULL_CONTROL"}]}' ;;
  *"iam list-users"*)
    echo '{"Users": [{"UserName": "alice"}, {"UserName": "bob"}]}' ;;
  *"iam list-attached-user-policies"*"alice"*)
    echo '{"AttachedPolicies": [{"PolicyName": "AdministratorAccess"}]}' ;;
  *"iam list-attached-user-policies"*)
    echo '{"AttachedPolicies": [{"PolicyName": "ReadOnlyAccess"}]}' ;;
  *"ec2 describe-instances"*)
    echo '{"Reservations": [{"Instances": [{"InstanceId": "i-1", "PublicIpAddress": "1.2.3.4"}, {"InstanceId": "i-2"}]}]}' ;;
  *"cloudtrail describe-trails"*)
    echo '{"trailList": [{"Name": "trail-x"}]}' ;;
  *"cloudtrail get-trail-status"*)
    echo '{"IsLogging": false}' ;;
  *"ec2 describe-security-groups"*)
    echo '{"SecurityGroups": [{"GroupId": "sg-9", "Description": "bastion", "IpPermissions": [{"FromPort": 22, "IpProtocol": "tcp", "IpRanges": [{"CidrIp": "10.0.0.0/8"}, {"CidrIp": "0.0.0.0/0"}]}]}]}' ;;
  *"--version"*)
    echo "aws-cli/2.15.0 Python/3.11.6" ;;
  *)
    echo "unknown command: $*" >&2
    exit 1 ;;
esac
"#;

#[cfg(unix)]
pub const FAKE_AWS_DENIED_SESSION: &str = r#"#!/bin/sh
case "$*" in
  *"sts get-caller-identity"*)
    echo "An error occurred (AccessDenied) when calling the GetCallerIdentity operation" >&2
    exit 254 ;;
  *"--version"*)
    echo "aws-cli/2.15.0 Python/3.11.6" ;;
  *)
    exit 1 ;;
esac
"#;
