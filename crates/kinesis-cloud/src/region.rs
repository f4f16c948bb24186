use crate::error::{CloudWatchError, Result};

/// Region codes CloudWatch is served from.
const KNOWN_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "ca-central-1",
    "ca-west-1",
    "sa-east-1",
    "mx-central-1",
    "eu-central-1",
    "eu-central-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "af-south-1",
    "me-south-1",
    "me-central-1",
    "il-central-1",
    "ap-east-1",
    "ap-east-2",
    "ap-south-1",
    "ap-south-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-southeast-5",
    "ap-southeast-7",
    "cn-north-1",
    "cn-northwest-1",
];

/// A recognised AWS region and its CloudWatch endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    code: String,
}

impl Region {
    /// Look up a region code.
    ///
    /// # Errors
    ///
    /// Returns [`CloudWatchError::UnknownRegion`] for codes outside the table.
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if KNOWN_REGIONS.contains(&code) {
            Ok(Self {
                code: code.to_string(),
            })
        } else {
            Err(CloudWatchError::UnknownRegion(code.to_string()))
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Host serving the CloudWatch API for this region.
    pub fn monitoring_host(&self) -> String {
        if self.code.starts_with("cn-") {
            format!("monitoring.{}.amazonaws.com.cn", self.code)
        } else {
            format!("monitoring.{}.amazonaws.com", self.code)
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}
