use crate::core::{Category, Finding, RiskLevel};

pub const PLACEHOLDER: &str = "unknown";
pub const PLACEHOLDER_PORT: &str = "all";
pub const NO_TRAIL_RESOURCE: &str = "cloudtrail";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFinding {
    PublicBucket {
        name: String,
    },
    AdminUser {
        name: String,
    },
    PublicInstance {
        instance_id: String,
        public_ip: Option<String>,
    },
    LoggingIssue {
        trail: Option<String>,
        issue: String,
    },
    OpenIngress {
        group_id: String,
        port: Option<i64>,
        protocol: Option<String>,
        description: Option<String>,
    },
}

impl RawFinding {
    pub const fn category(&self) -> Category {
        match self {
            RawFinding::PublicBucket { .. } => Category::Storage,
            RawFinding::AdminUser { .. } => Category::Identity,
            RawFinding::PublicInstance { .. } => Category::Compute,
            RawFinding::LoggingIssue { .. } => Category::Logging,
            RawFinding::OpenIngress { .. } => Category::Network,
        }
    }
}

pub fn normalize(raw: &RawFinding) -> Finding {
    match raw {
        RawFinding::PublicBucket { name } => Finding::new(
            Category::Storage,
            name.clone(),
            RiskLevel::High,
            "Public Access",
        ),
        RawFinding::AdminUser { name } => Finding::new(
            Category::Identity,
            name.clone(),
            RiskLevel::Medium,
            "Admin Access",
        ),
        RawFinding::PublicInstance {
            instance_id,
            public_ip,
        } => Finding::new(
            Category::Compute,
            instance_id.clone(),
            RiskLevel::High,
            "Public Instance",
        )
        .with_detail("ip", public_ip.clone().unwrap_or_else(|| PLACEHOLDER.to_string())),
        RawFinding::LoggingIssue { trail, issue } => Finding::new(
            Category::Logging,
            trail.clone().unwrap_or_else(|| NO_TRAIL_RESOURCE.to_string()),
            RiskLevel::Medium,
            "Logging Issue",
        )
        .with_detail("issue", issue.clone()),
        RawFinding::OpenIngress {
            group_id,
            port,
            protocol,
            description,
        } => {
            let protocol = match protocol.as_deref() {
                None | Some("-1") => PLACEHOLDER_PORT.to_string(),
                Some(p) => p.to_string(),
            };
            let mut finding = Finding::new(
                Category::Network,
                group_id.clone(),
                RiskLevel::High,
                "Open Access",
            )
            .with_detail(
                "port",
                port.map(|p| p.to_string())
                    .unwrap_or_else(|| PLACEHOLDER_PORT.to_string()),
            )
            .with_detail("protocol", protocol);
            if let Some(description) = description {
                finding = finding.with_detail("description", description.clone());
            }
            finding
        }
    }
}
