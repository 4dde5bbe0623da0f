use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::{Category, CategoryResult, Finding};

pub fn file_name(category: Category) -> &'static str {
    match category {
        Category::Storage => "public_s3_buckets.csv",
        Category::Identity => "iam_admin_users.csv",
        Category::Compute => "public_ec2_instances.csv",
        Category::Logging => "cloudtrail_status.csv",
        Category::Network => "security_groups.csv",
    }
}

fn headers(category: Category) -> &'static [&'static str] {
    match category {
        Category::Storage => &["Bucket"],
        Category::Identity => &["AdminUser"],
        Category::Compute => &["InstanceId", "PublicIp"],
        Category::Logging => &["CloudTrailIssue"],
        Category::Network => &["GroupId", "Port", "Protocol", "Description"],
    }
}

fn row(finding: &Finding) -> Vec<String> {
    let detail = |key: &str| finding.detail.get(key).cloned().unwrap_or_default();
    match finding.category {
        Category::Storage | Category::Identity => vec![finding.resource.clone()],
        Category::Compute => vec![finding.resource.clone(), detail("ip")],
        Category::Logging => vec![detail("issue")],
        Category::Network => vec![
            finding.resource.clone(),
            detail("port"),
            detail("protocol"),
            detail("description"),
        ],
    }
}

pub fn write_category(dir: &Path, category: Category, result: &CategoryResult) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("出力先ディレクトリを作成できません: {}", dir.display()))?;
    let path = dir.join(file_name(category));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("CSV を書き込めません: {}", path.display()))?;
    writer
        .write_record(headers(category))
        .context("CSV ヘッダの書き込みに失敗しました")?;
    for finding in &result.findings {
        writer
            .write_record(row(finding))
            .with_context(|| format!("CSV 行の書き込みに失敗しました: {}", finding.resource))?;
    }
    writer
        .flush()
        .with_context(|| format!("CSV の書き込みを完了できません: {}", path.display()))?;
    Ok(path)
}
