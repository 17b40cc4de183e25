use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ProviderError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("error looking up {what}: {source}")]
    Lookup {
        what: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("invalid ARN: {0:?}")]
    InvalidArn(String),

    #[error("error trying to AssumeRole: {0}")]
    AssumeRole(#[source] ProviderError),

    #[error("error trying to AssumeRole without MFA: {0}")]
    NonMfaAssumeRole(#[source] ProviderError),

    #[error(
        "error trying to AssumeRole without MFA: {non_mfa}; \
         error trying to AssumeRole with MFA: no MFA devices found"
    )]
    NoMfaDevices { non_mfa: ProviderError },

    #[error(
        "error trying to AssumeRole without MFA: {non_mfa}; \
         error trying to AssumeRole with MFA: {mfa}"
    )]
    MfaAssumeRole {
        non_mfa: ProviderError,
        mfa: ProviderError,
    },

    #[error("MFA device {0} is not registered to the current principal")]
    MfaDeviceNotFound(String),

    #[error("unexpected end of input")]
    UnexpectedEndOfInput,

    #[error("error reading MFA prompt: {0}")]
    Prompt(#[from] io::Error),

    #[error("failed to {action} for profile {key}: {source}")]
    Store {
        action: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Error {
    pub(crate) fn lookup(what: &'static str) -> impl FnOnce(ProviderError) -> Self {
        move |source| Error::Lookup { what, source }
    }

    pub(crate) fn store(action: &'static str, key: &str, source: anyhow::Error) -> Self {
        Error::Store {
            action,
            key: key.to_string(),
            source,
        }
    }
}
