use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// An AWS resource name, `arn:partition:service:region:account-id:resource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    partition: String,
    service: String,
    region: String,
    account_id: String,
    resource: String,
}

impl Arn {
    pub fn parse(s: &str) -> Result<Arn, Error> {
        let parts = s.splitn(6, ':').collect::<Vec<_>>();
        match parts.as_slice() {
            ["arn", partition, service, region, account_id, resource]
                if !partition.is_empty() && !service.is_empty() && !resource.is_empty() =>
            {
                Ok(Arn {
                    partition: partition.to_string(),
                    service: service.to_string(),
                    region: region.to_string(),
                    account_id: account_id.to_string(),
                    resource: resource.to_string(),
                })
            }
            _ => Err(Error::InvalidArn(s.to_string())),
        }
    }

    /// `arn:{partition}:iam::{account_id}:role/{role_name}`
    pub fn role(partition: &str, account_id: &str, role_name: &str) -> Arn {
        Arn {
            partition: partition.to_string(),
            service: "iam".to_string(),
            region: String::new(),
            account_id: account_id.to_string(),
            resource: format!("role/{}", role_name),
        }
    }

    pub fn looks_like_arn(s: &str) -> bool {
        s.starts_with("arn:")
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// True for STS session identities (`sts ... assumed-role/role/session`),
    /// false for IAM users and anything else.
    pub fn is_assumed_role(&self) -> bool {
        self.service == "sts" && self.resource.starts_with("assumed-role/")
    }

    /// Role name of an IAM role ARN, without its path.
    pub fn role_name(&self) -> Option<&str> {
        self.resource
            .strip_prefix("role/")
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty())
    }

    /// Session name of an assumed-role ARN.
    pub fn session_name(&self) -> Option<&str> {
        if !self.is_assumed_role() {
            return None;
        }
        self.resource.splitn(3, '/').nth(2).filter(|s| !s.is_empty())
    }
}

impl FromStr for Arn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arn::parse(s)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}
