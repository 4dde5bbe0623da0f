use std::time::Duration;

use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::{AlertConfig, EmailConfig, WebhookConfig};
use crate::core::{Category, Finding};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub channel: String,
    pub ok: bool,
    pub error: Option<String>,
}

pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn notify(&self, message: &AlertMessage) -> Result<()>;
}

pub struct Dispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn from_config(alert: &AlertConfig) -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(email) = &alert.email {
            if email_is_configured(email) {
                notifiers.push(Box::new(EmailNotifier {
                    config: email.clone(),
                }));
            }
        }
        if let Some(webhook) = &alert.webhook {
            if webhook_is_configured(webhook) {
                notifiers.push(Box::new(WebhookNotifier {
                    url: webhook.url.clone(),
                }));
            }
        }
        Self { notifiers }
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    pub fn dispatch(&self, message: &AlertMessage) -> Vec<ChannelOutcome> {
        self.notifiers
            .iter()
            .map(|notifier| match notifier.notify(message) {
                Ok(()) => ChannelOutcome {
                    channel: notifier.name().to_string(),
                    ok: true,
                    error: None,
                },
                Err(err) => ChannelOutcome {
                    channel: notifier.name().to_string(),
                    ok: false,
                    error: Some(format!("{err:#}")),
                },
            })
            .collect()
    }
}

pub fn email_is_configured(email: &EmailConfig) -> bool {
    !email.smtp_host.trim().is_empty()
        && !email.to.trim().is_empty()
        && !email.password.trim().is_empty()
        && !is_placeholder(&email.password)
        && !is_placeholder(&email.smtp_host)
}

pub fn webhook_is_configured(webhook: &WebhookConfig) -> bool {
    let url = webhook.url.trim();
    !url.is_empty() && !is_placeholder(url)
}

fn is_placeholder(value: &str) -> bool {
    value.contains("XXXX") || value.contains("your-app-password") || value.contains("example.com/replace")
}

pub fn category_message(category: Category, findings: &[Finding]) -> AlertMessage {
    let subject = format!("CSPM警告: {}", headline(category));
    let mut body = format!("{subject}（{}件）\n", findings.len());
    for finding in findings {
        body.push_str("- ");
        body.push_str(&finding_line(finding));
        body.push('\n');
    }
    AlertMessage { subject, body }
}

fn headline(category: Category) -> &'static str {
    match category {
        Category::Storage => "公開S3バケット",
        Category::Identity => "IAM管理者ユーザー",
        Category::Compute => "公開EC2インスタンス",
        Category::Logging => "CloudTrail の問題",
        Category::Network => "0.0.0.0/0 に開放されたセキュリティグループ",
    }
}

fn finding_line(finding: &Finding) -> String {
    match finding.category {
        Category::Compute => {
            let ip = finding
                .detail
                .get("ip")
                .map(String::as_str)
                .unwrap_or(crate::core::PLACEHOLDER);
            format!("{} - {ip}", finding.resource)
        }
        Category::Logging => finding
            .detail
            .get("issue")
            .cloned()
            .unwrap_or_else(|| finding.resource.clone()),
        Category::Network => {
            let port = finding
                .detail
                .get("port")
                .map(String::as_str)
                .unwrap_or(crate::core::PLACEHOLDER_PORT);
            let protocol = finding
                .detail
                .get("protocol")
                .map(String::as_str)
                .unwrap_or(crate::core::PLACEHOLDER_PORT);
            format!(
                "{} が {protocol}:{port} を 0.0.0.0/0 に開放しています",
                finding.resource
            )
        }
        _ => finding.resource.clone(),
    }
}

struct WebhookNotifier {
    url: String,
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn notify(&self, message: &AlertMessage) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .context("Webhook クライアントの初期化に失敗しました")?;
        client
            .post(&self.url)
            .json(&serde_json::json!({ "text": message.body }))
            .send()
            .context("Webhook への送信に失敗しました")?
            .error_for_status()
            .context("Webhook がエラー応答を返しました")?;
        Ok(())
    }
}

struct EmailNotifier {
    config: EmailConfig,
}

impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    fn notify(&self, message: &AlertMessage) -> Result<()> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .with_context(|| format!("送信元アドレスが不正です: {}", self.config.from))?;
        let to: Mailbox = self
            .config
            .to
            .parse()
            .with_context(|| format!("宛先アドレスが不正です: {}", self.config.to))?;
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(&message.subject)
            .body(message.body.clone())
            .context("メールの組み立てに失敗しました")?;

        let transport = SmtpTransport::starttls_relay(&self.config.smtp_host)
            .with_context(|| format!("SMTP ホストに接続できません: {}", self.config.smtp_host))?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .timeout(Some(DELIVERY_TIMEOUT))
            .build();
        transport
            .send(&email)
            .context("メールの送信に失敗しました")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RawFinding, normalize};

    #[test]
    fn placeholder_webhook_is_skipped() {
        let alert = AlertConfig {
            email: None,
            webhook: Some(WebhookConfig {
                url: "https://hooks.slack.com/services/XXXXXXXXX/XXXXXXXXX/XXXXXXXXXXXXXXXXX"
                    .to_string(),
            }),
        };
        assert!(Dispatcher::from_config(&alert).is_empty());
    }

    #[test]
    fn placeholder_email_password_is_skipped() {
        let alert = AlertConfig {
            email: Some(EmailConfig {
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                from: "cspm@example.com".to_string(),
                to: "admin@example.com".to_string(),
                username: "cspm@example.com".to_string(),
                password: "your-app-password".to_string(),
            }),
            webhook: None,
        };
        assert!(Dispatcher::from_config(&alert).is_empty());
    }

    #[test]
    fn configured_channels_are_built_in_email_then_webhook_order() {
        let alert = AlertConfig {
            email: Some(EmailConfig {
                smtp_host: "smtp.example.com".to_string(),
                smtp_port: 587,
                from: "cspm@example.com".to_string(),
                to: "admin@example.com".to_string(),
                username: "cspm@example.com".to_string(),
                password: "s3cret".to_string(),
            }),
            webhook: Some(WebhookConfig {
                url: "https://hooks.slack.com/services/T000/B000/token".to_string(),
            }),
        };
        let dispatcher = Dispatcher::from_config(&alert);
        assert_eq!(dispatcher.channel_names(), vec!["email", "webhook"]);
    }

    #[test]
    fn category_message_lists_each_finding() {
        let findings = vec![
            normalize(&RawFinding::OpenIngress {
                group_id: "sg-9".to_string(),
                port: Some(22),
                protocol: Some("tcp".to_string()),
                description: None,
            }),
            normalize(&RawFinding::OpenIngress {
                group_id: "sg-10".to_string(),
                port: None,
                protocol: Some("-1".to_string()),
                description: None,
            }),
        ];
        let message = category_message(Category::Network, &findings);
        assert!(message.subject.contains("セキュリティグループ"));
        assert!(message.body.contains("（2件）"), "body={}", message.body);
        assert!(message.body.contains("sg-9 が tcp:22"), "body={}", message.body);
        assert!(message.body.contains("sg-10 が all:all"), "body={}", message.body);
    }

    #[test]
    fn compute_message_includes_public_ip() {
        let findings = vec![normalize(&RawFinding::PublicInstance {
            instance_id: "i-1".to_string(),
            public_ip: Some("1.2.3.4".to_string()),
        })];
        let message = category_message(Category::Compute, &findings);
        assert!(message.body.contains("i-1 - 1.2.3.4"), "body={}", message.body);
    }
}
