use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::TemporaryCredentials;

/// Metadata describing how the cached credentials of a profile were obtained.
///
/// `expires` mirrors the credentials' expiry so a store can answer freshness
/// questions without loading the secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfiguration {
    pub role_arn: String,
    pub role_session_name: String,
    pub mfa_serial: Option<String>,
    pub expires: DateTime<Utc>,
}

impl ProfileConfiguration {
    pub fn for_credentials(
        role_arn: impl Into<String>,
        role_session_name: impl Into<String>,
        mfa_serial: Option<String>,
        credentials: &TemporaryCredentials,
    ) -> Self {
        ProfileConfiguration {
            role_arn: role_arn.into(),
            role_session_name: role_session_name.into(),
            mfa_serial,
            expires: credentials.expires,
        }
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    pub fn role_session_name(&self) -> &str {
        &self.role_session_name
    }

    pub fn mfa_serial(&self) -> Option<&str> {
        self.mfa_serial.as_deref()
    }
}
