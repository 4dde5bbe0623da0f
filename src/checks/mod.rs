use std::fmt;
use std::time::{Duration, Instant};

use crate::aws::{AwsContext, CommandOutput};
use crate::core::{Category, RawFinding};

#[derive(Debug, Clone)]
pub struct CheckContext {
    pub aws: AwsContext,
    pub timeout: Duration,
    pub deadline: Option<Instant>,
}

impl CheckContext {
    pub fn command_timeout(&self) -> Duration {
        let Some(deadline) = self.deadline else {
            return self.timeout;
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        std::cmp::min(self.timeout, remaining)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    PermissionDenied(String),
    Transient(String),
    Unknown(String),
}

impl CheckError {
    pub fn classify(output: &CommandOutput) -> Self {
        let stderr = output.stderr.trim().to_string();
        let lowered = stderr.to_ascii_lowercase();
        if lowered.contains("accessdenied")
            || lowered.contains("unauthorizedoperation")
            || lowered.contains("authfailure")
            || lowered.contains("not authorized")
        {
            return CheckError::PermissionDenied(stderr);
        }
        if lowered.contains("could not connect")
            || lowered.contains("connection was closed")
            || lowered.contains("timed out")
            || lowered.contains("throttling")
            || lowered.contains("requestlimitexceeded")
        {
            return CheckError::Transient(stderr);
        }
        CheckError::Unknown(stderr)
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckError::PermissionDenied(msg) => write!(f, "権限がありません: {msg}"),
            CheckError::Transient(msg) => write!(f, "一時的なエラー: {msg}"),
            CheckError::Unknown(msg) => write!(f, "不明なエラー: {msg}"),
        }
    }
}

impl std::error::Error for CheckError {}

pub trait Checker: Send + Sync {
    fn category(&self) -> Category;
    fn check(&self, ctx: &CheckContext) -> Result<Vec<RawFinding>, CheckError>;
}

pub fn default_checkers() -> Vec<Box<dyn Checker>> {
    vec![
        Box::new(StorageExposure),
        Box::new(IdentityPrivilege),
        Box::new(ComputeExposure),
        Box::new(AuditLogging),
        Box::new(NetworkIngress),
    ]
}

fn run_json(ctx: &CheckContext, args: &[&str]) -> Result<serde_json::Value, CheckError> {
    let timeout = ctx.command_timeout();
    if timeout == Duration::from_secs(0) {
        return Err(CheckError::Transient(
            "タイムアウト予算を使い切りました".to_string(),
        ));
    }
    let output = ctx
        .aws
        .run(args, timeout)
        .map_err(|err| CheckError::Transient(err.to_string()))?;
    if !output.success() {
        return Err(CheckError::classify(&output));
    }
    serde_json::from_str(&output.stdout).map_err(|err| {
        CheckError::Unknown(format!("aws {} の出力を解析できません: {err}", args.join(" ")))
    })
}

fn str_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn array<'a>(value: &'a serde_json::Value, key: &str) -> Vec<&'a serde_json::Value> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.iter().collect())
        .unwrap_or_default()
}

pub struct StorageExposure;

impl Checker for StorageExposure {
    fn category(&self) -> Category {
        Category::Storage
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<RawFinding>, CheckError> {
        let listing = run_json(ctx, &["s3api", "list-buckets"])?;
        let mut raw = Vec::new();
        for bucket in array(&listing, "Buckets") {
            let Some(name) = str_field(bucket, "Name") else {
                continue;
            };
            let Ok(acl) = run_json(ctx, &["s3api", "get-bucket-acl", "--bucket", name.as_str()])
            else {
                continue;
            };
            if acl_grants_all_users(&acl) {
                raw.push(RawFinding::PublicBucket { name });
            }
        }
        Ok(raw)
    }
}

fn acl_grants_all_users(acl: &serde_json::Value) -> bool {
    array(acl, "Grants").iter().any(|grant| {
        let Some(grantee) = grant.get("Grantee") else {
            return false;
        };
        grantee.get("Type").and_then(|t| t.as_str()) == Some("Group")
            && grantee
                .get("URI")
                .and_then(|u| u.as_str())
                .is_some_and(|uri| uri.contains("AllUsers"))
    })
}

pub struct IdentityPrivilege;

impl Checker for IdentityPrivilege {
    fn category(&self) -> Category {
        Category::Identity
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<RawFinding>, CheckError> {
        let listing = run_json(ctx, &["iam", "list-users"])?;
        let mut raw = Vec::new();
        for user in array(&listing, "Users") {
            let Some(name) = str_field(user, "UserName") else {
                continue;
            };
            let Ok(policies) = run_json(
                ctx,
                &["iam", "list-attached-user-policies", "--user-name", name.as_str()],
            ) else {
                continue;
            };
            if has_admin_policy(&policies) {
                raw.push(RawFinding::AdminUser { name });
            }
        }
        Ok(raw)
    }
}

fn has_admin_policy(policies: &serde_json::Value) -> bool {
    array(policies, "AttachedPolicies").iter().any(|policy| {
        policy
            .get("PolicyName")
            .and_then(|n| n.as_str())
            .is_some_and(|name| name.contains("AdministratorAccess"))
    })
}

pub struct ComputeExposure;

impl Checker for ComputeExposure {
    fn category(&self) -> Category {
        Category::Compute
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<RawFinding>, CheckError> {
        let listing = run_json(ctx, &["ec2", "describe-instances"])?;
        Ok(public_instances(&listing))
    }
}

fn public_instances(listing: &serde_json::Value) -> Vec<RawFinding> {
    let mut raw = Vec::new();
    for reservation in array(listing, "Reservations") {
        for instance in array(reservation, "Instances") {
            let Some(public_ip) = str_field(instance, "PublicIpAddress") else {
                continue;
            };
            if public_ip.is_empty() {
                continue;
            }
            raw.push(RawFinding::PublicInstance {
                instance_id: str_field(instance, "InstanceId")
                    .unwrap_or_else(|| crate::core::PLACEHOLDER.to_string()),
                public_ip: Some(public_ip),
            });
        }
    }
    raw
}

pub struct AuditLogging;

impl Checker for AuditLogging {
    fn category(&self) -> Category {
        Category::Logging
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<RawFinding>, CheckError> {
        let listing = run_json(ctx, &["cloudtrail", "describe-trails"])?;
        let trails = array(&listing, "trailList");
        if trails.is_empty() {
            return Ok(vec![RawFinding::LoggingIssue {
                trail: None,
                issue: "CloudTrail が1つも構成されていません".to_string(),
            }]);
        }

        let mut raw = Vec::new();
        for trail in trails {
            let Some(name) = str_field(trail, "Name") else {
                continue;
            };
            let status =
                run_json(ctx, &["cloudtrail", "get-trail-status", "--name", name.as_str()])?;
            if status.get("IsLogging").and_then(|v| v.as_bool()) != Some(true) {
                raw.push(RawFinding::LoggingIssue {
                    trail: Some(name.clone()),
                    issue: format!("CloudTrail '{name}' はログを記録していません"),
                });
            }
        }
        Ok(raw)
    }
}

pub struct NetworkIngress;

impl Checker for NetworkIngress {
    fn category(&self) -> Category {
        Category::Network
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<RawFinding>, CheckError> {
        let listing = run_json(ctx, &["ec2", "describe-security-groups"])?;
        Ok(open_ingress_rules(&listing))
    }
}

fn open_ingress_rules(listing: &serde_json::Value) -> Vec<RawFinding> {
    let mut raw = Vec::new();
    for group in array(listing, "SecurityGroups") {
        let Some(group_id) = str_field(group, "GroupId") else {
            continue;
        };
        let description = str_field(group, "Description");
        for permission in array(group, "IpPermissions") {
            for ip_range in array(permission, "IpRanges") {
                if ip_range.get("CidrIp").and_then(|v| v.as_str()) != Some("0.0.0.0/0") {
                    continue;
                }
                raw.push(RawFinding::OpenIngress {
                    group_id: group_id.clone(),
                    port: permission.get("FromPort").and_then(|v| v.as_i64()),
                    protocol: str_field(permission, "IpProtocol"),
                    description: description.clone(),
                });
            }
        }
    }
    raw
}
