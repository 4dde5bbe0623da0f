use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub scan: ScanConfig,
    pub alert: AlertConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanConfig {
    pub aws_bin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub export_dir: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub from: String,
    pub to: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            scan: ScanConfig {
                aws_bin: crate::aws::DEFAULT_BIN.to_string(),
                profile: None,
                region: None,
                export_dir: "logs".to_string(),
            },
            alert: AlertConfig::default(),
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    scan: Option<RawScanConfig>,
    alert: Option<RawAlertConfig>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawScanConfig {
    aws_bin: Option<String>,
    profile: Option<String>,
    region: Option<String>,
    export_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAlertConfig {
    email: Option<EmailConfig>,
    webhook: Option<WebhookConfig>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/awscan/config.toml")
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("環境変数 HOME が設定されていません"))
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("設定ファイルの読み取りに失敗しました: {}", path.display()))?;
        let raw: RawConfig =
            toml::from_str(&s).context("設定ファイル(TOML)の解析に失敗しました")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(scan) = raw.scan {
        if let Some(aws_bin) = scan.aws_bin {
            cfg.scan.aws_bin = aws_bin;
        }
        if let Some(profile) = scan.profile {
            cfg.scan.profile = Some(profile);
        }
        if let Some(region) = scan.region {
            cfg.scan.region = Some(region);
        }
        if let Some(export_dir) = scan.export_dir {
            cfg.scan.export_dir = export_dir;
        }
    }

    if let Some(alert) = raw.alert {
        if let Some(email) = alert.email {
            cfg.alert.email = Some(email);
        }
        if let Some(webhook) = alert.webhook {
            cfg.alert.webhook = Some(webhook);
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("AWSCAN_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "AWSCAN_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("AWSCAN_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "AWSCAN_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("AWSCAN_SCAN_AWS_BIN") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.scan.aws_bin = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("AWSCAN_SCAN_PROFILE") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.scan.profile = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("AWSCAN_SCAN_REGION") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.scan.region = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("AWSCAN_SCAN_EXPORT_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.scan.export_dir = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("AWSCAN_ALERT_WEBHOOK_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.alert.webhook = Some(WebhookConfig { url: v.to_string() });
        }
    }
    if let Ok(v) = std::env::var("AWSCAN_ALERT_EMAIL_PASSWORD") {
        if let Some(email) = cfg.alert.email.as_mut() {
            email.password = v;
        }
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "真偽値が不正です: {s}（true|false|1|0|yes|no|on|off を指定してください）"
        )),
    }
}
