use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Storage,
    Identity,
    Compute,
    Logging,
    Network,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Storage,
        Category::Identity,
        Category::Compute,
        Category::Logging,
        Category::Network,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Storage => "storage",
            Category::Identity => "identity",
            Category::Compute => "compute",
            Category::Logging => "logging",
            Category::Network => "network",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Category::Storage => "S3 バケット",
            Category::Identity => "IAM ユーザー",
            Category::Compute => "EC2 インスタンス",
            Category::Logging => "CloudTrail",
            Category::Network => "セキュリティグループ",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storage" | "s3" => Ok(Category::Storage),
            "identity" | "iam" => Ok(Category::Identity),
            "compute" | "ec2" => Ok(Category::Compute),
            "logging" | "cloudtrail" => Ok(Category::Logging),
            "network" | "sg" => Ok(Category::Network),
            other => Err(format!(
                "カテゴリが不正です: {other}（storage|identity|compute|logging|network を指定してください）"
            )),
        }
    }
}
