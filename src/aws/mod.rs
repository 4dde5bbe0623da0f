use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use wait_timeout::ChildExt;

pub const DEFAULT_BIN: &str = "aws";

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone)]
pub struct AwsContext {
    bin: String,
    profile: Option<String>,
    region: Option<String>,
}

impl AwsContext {
    pub fn new(bin: impl Into<String>, profile: Option<String>, region: Option<String>) -> Self {
        Self {
            bin: bin.into(),
            profile,
            region,
        }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn run(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let mut full: Vec<&str> = Vec::with_capacity(args.len() + 6);
        full.extend_from_slice(args);
        full.extend_from_slice(&["--output", "json"]);
        if let Some(profile) = &self.profile {
            full.extend_from_slice(&["--profile", profile.as_str()]);
        }
        if let Some(region) = &self.region {
            full.extend_from_slice(&["--region", region.as_str()]);
        }
        run_command(&self.bin, &full, timeout)
    }

    pub fn run_json(&self, args: &[&str], timeout: Duration) -> Result<serde_json::Value> {
        let output = self.run(args, timeout)?;
        if !output.success() {
            return Err(anyhow!(
                "aws {} が失敗しました（exit_code={}）: {}",
                args.join(" "),
                output.exit_code,
                output.stderr.trim()
            ));
        }
        serde_json::from_str(&output.stdout)
            .with_context(|| format!("aws {} の出力(JSON)を解析できません", args.join(" ")))
    }

    pub fn version(&self, timeout: Duration) -> Result<String> {
        let output = run_command(&self.bin, &["--version"], timeout)?;
        if !output.success() {
            return Err(anyhow!(
                "AWS CLI のバージョン確認に失敗しました（exit_code={}）",
                output.exit_code
            ));
        }
        let line = if output.stdout.trim().is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(line.trim().to_string())
    }

    pub fn caller_identity(&self, timeout: Duration) -> Result<CallerIdentity> {
        let value = self
            .run_json(&["sts", "get-caller-identity"], timeout)
            .context("AWS セッションを確立できません（認証情報を確認してください）")?;
        serde_json::from_value(value).context("sts get-caller-identity の応答を解析できません")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Arn")]
    pub arn: String,
    #[serde(rename = "UserId")]
    pub user_id: String,
}

pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("プロセス起動に失敗しました: {cmd}"))?;

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("プロセス待機に失敗しました: {cmd}"))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("タイムアウトしました（{timeout:?}）: {cmd}"));
        }
    };

    let mut stdout = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}
