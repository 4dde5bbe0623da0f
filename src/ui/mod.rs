use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::aws::CallerIdentity;
use crate::core::{Category, Finding, RiskLevel, ScanState, ScanStatus};
use crate::engine::DeliveryOutcome;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "エラー:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "原因:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "次に:");
    let _ = writeln!(
        stderr,
        "  - AWS 認証情報を確認するには `awscan doctor` を実行してください"
    );
    let _ = writeln!(
        stderr,
        "  - 利用可能なコマンド/オプションは `awscan --help` を参照してください"
    );
}

pub fn print_scan_state(state: &ScanState, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let summary = state.summary();
    let _ = writeln!(
        out,
        "概要: 状態={}  検出合計={}  最終スキャン={}",
        summary.status.as_str(),
        summary.total_issues,
        summary.last_scan.as_deref().unwrap_or("なし")
    );
    if let Some(last_error) = &state.last_error {
        let _ = writeln!(out, "エラー: {last_error}");
    }

    let _ = writeln!(out);
    print_category_table(&mut out, state);

    for category in Category::ALL {
        let Some(result) = state.categories.get(&category) else {
            continue;
        };
        if result.findings.is_empty() {
            continue;
        }

        let total = result.findings.len();
        let rows = cfg.max_table_rows.max(1).min(total);
        let _ = writeln!(out);
        if total > rows {
            let _ = writeln!(out, "{}（{rows}件表示 / 全{total}件）:", category.label());
        } else {
            let _ = writeln!(out, "{}（{total}件）:", category.label());
        }
        print_findings_table(&mut out, &result.findings, rows, cfg.color);
        if total > rows {
            let _ = writeln!(out, "...（残り{}件）", total - rows);
        }
    }
}

pub fn print_delivery(outcome: &DeliveryOutcome, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    if !outcome.alerts.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "通知:");
        for (category, channels) in &outcome.alerts {
            let mut parts = Vec::new();
            for channel in channels {
                if channel.ok {
                    parts.push(format!("{}=送信済み", channel.channel));
                } else {
                    parts.push(format!(
                        "{}=失敗（{}）",
                        channel.channel,
                        channel.error.as_deref().unwrap_or("不明")
                    ));
                }
            }
            let _ = writeln!(out, "- {}: {}", category.label(), parts.join("  "));
        }
    }

    if !outcome.exports.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "エクスポート:");
        for (category, exported) in &outcome.exports {
            match exported {
                Ok(path) => {
                    let _ = writeln!(out, "- {}: {}", category.label(), path.display());
                }
                Err(err) => {
                    let _ = writeln!(out, "- {}: 失敗（{err}）", category.label());
                }
            }
        }
    }
}

pub fn print_doctor(version: &str, identity: &CallerIdentity, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(out, "AWS CLI: {version}");
    let _ = writeln!(out, "接続: OK");
    let _ = writeln!(out, "- アカウント: {}", identity.account);
    let _ = writeln!(out, "- ARN: {}", identity.arn);
    let _ = writeln!(out, "- ユーザーID: {}", identity.user_id);
}

fn print_category_table(out: &mut dyn Write, state: &ScanState) {
    let label_category = "カテゴリ";
    let label_count = "件数";
    let label_status = "状態";

    let category_w = Category::ALL
        .iter()
        .map(|c| visible_width_ansi(c.label()))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_category));
    let count_w = visible_width_ansi(label_count).max(4);

    let _ = writeln!(
        out,
        "{}  {}  {}",
        pad_end_display(label_category, category_w),
        pad_start_display(label_count, count_w),
        label_status
    );
    let _ = writeln!(
        out,
        "{}  {}  {}",
        "-".repeat(category_w),
        "-".repeat(count_w),
        "-".repeat(visible_width_ansi(label_status))
    );

    for category in Category::ALL {
        let result = state.categories.get(&category);
        let count = result.map(|r| r.findings.len()).unwrap_or(0);
        let status = match result {
            None => {
                if state.status == ScanStatus::Scanning {
                    "確認中".to_string()
                } else {
                    "未実施".to_string()
                }
            }
            Some(r) => match &r.error {
                Some(err) => format!("失敗（{}）", truncate_middle(err, 60)),
                None => "OK".to_string(),
            },
        };
        let _ = writeln!(
            out,
            "{}  {}  {}",
            pad_end_display(category.label(), category_w),
            pad_start_display(&count.to_string(), count_w),
            status
        );
    }
}

fn print_findings_table(out: &mut dyn Write, findings: &[Finding], rows: usize, color: bool) {
    let label_resource = "リソース";
    let label_risk = "リスク";
    let label_type = "種別";
    let label_detail = "詳細";

    let resource_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(&f.resource))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_resource));
    let risk_w = visible_width_ansi(label_risk).max(6);
    let type_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(&f.finding_type))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_type));

    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        pad_end_display(label_resource, resource_w),
        pad_end_display(label_risk, risk_w),
        pad_end_display(label_type, type_w),
        label_detail
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        "-".repeat(resource_w),
        "-".repeat(risk_w),
        "-".repeat(type_w),
        "-".repeat(visible_width_ansi(label_detail))
    );

    for finding in findings.iter().take(rows) {
        let _ = writeln!(
            out,
            "{}  {}  {}  {}",
            pad_end_display(&finding.resource, resource_w),
            pad_end_ansi(&format_risk(finding.risk, color), risk_w),
            pad_end_display(&finding.finding_type, type_w),
            detail_string(finding)
        );
    }
}

pub fn detail_string(finding: &Finding) -> String {
    finding
        .detail
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_risk(risk: RiskLevel, color: bool) -> String {
    let s = risk.as_str();
    if !color {
        return s.to_string();
    }

    let code = match risk {
        RiskLevel::Low => "32",
        RiskLevel::Medium => "33",
        RiskLevel::High => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.peek() == Some(&'[') {
                let _ = chars.next();
                while let Some(ch2) = chars.next() {
                    if ch2 == 'm' {
                        break;
                    }
                }
                continue;
            }
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s
        .chars()
        .rev()
        .take(right)
        .collect::<String>()
        .chars()
        .rev()
        .collect();

    format!("{prefix}...{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_risk_is_plain_without_color() {
        assert_eq!(format_risk(RiskLevel::High, false), "High");
        assert!(format_risk(RiskLevel::High, true).contains("\x1b[31m"));
    }

    #[test]
    fn visible_width_ignores_ansi_and_counts_wide_chars() {
        assert_eq!(visible_width_ansi("\x1b[31mHigh\x1b[0m"), 4);
        assert_eq!(visible_width_ansi("リスク"), 6);
    }

    #[test]
    fn detail_string_joins_sorted_pairs() {
        use crate::core::{Category, Finding};
        let finding = Finding::new(Category::Network, "sg-1", RiskLevel::High, "Open Access")
            .with_detail("protocol", "tcp")
            .with_detail("port", "22");
        assert_eq!(detail_string(&finding), "port=22 protocol=tcp");
    }
}
