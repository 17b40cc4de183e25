use std::fmt;

use async_trait::async_trait;

use assume_role_schema::credentials::TemporaryCredentials;

pub mod rusoto;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The caller is not allowed to perform the call, e.g. because the role
    /// trust policy demands MFA.
    AccessDenied,
    Other,
}

/// A failed call to the identity provider, classified so callers can tell
/// access-denied responses apart from everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        ProviderError {
            kind,
            message: message.into(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        ProviderError::new(ProviderErrorKind::AccessDenied, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        ProviderError::new(ProviderErrorKind::Other, message)
    }

    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn is_access_denied(&self) -> bool {
        self.kind == ProviderErrorKind::AccessDenied
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProviderErrorKind::AccessDenied => write!(f, "AccessDenied: {}", self.message),
            ProviderErrorKind::Other => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// The calls made against the cloud identity service.
#[async_trait]
pub trait IdentityProvider {
    async fn current_principal_arn(&self) -> Result<String, ProviderError>;

    async fn username(&self) -> Result<String, ProviderError>;

    /// Serials of the MFA devices registered to the current principal, in
    /// the order the service lists them.
    async fn mfa_devices(&self) -> Result<Vec<String>, ProviderError>;

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> Result<TemporaryCredentials, ProviderError>;

    async fn assume_role_with_mfa(
        &self,
        role_arn: &str,
        session_name: &str,
        mfa_serial: &str,
        token_code: &str,
    ) -> Result<TemporaryCredentials, ProviderError>;
}
