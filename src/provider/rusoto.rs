use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusoto_core::{Region, RusotoError};
use rusoto_iam::{GetUserRequest, Iam, IamClient, ListMFADevicesRequest};
use rusoto_sts::{AssumeRoleRequest, GetCallerIdentityRequest, Sts, StsClient};
use tracing::debug;

use assume_role_schema::credentials::TemporaryCredentials;

use crate::provider::{IdentityProvider, ProviderError};

/// `IdentityProvider` backed by the STS and IAM APIs.
pub struct RusotoIdentityProvider {
    sts: StsClient,
    iam: IamClient,
    duration_seconds: Option<i64>,
}

impl RusotoIdentityProvider {
    pub fn new(region: Region) -> Self {
        RusotoIdentityProvider {
            sts: StsClient::new(region.clone()),
            iam: IamClient::new(region),
            duration_seconds: None,
        }
    }

    pub fn with_duration_seconds(mut self, duration_seconds: Option<i64>) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    async fn sts_assume_role(
        &self,
        request: AssumeRoleRequest,
    ) -> Result<TemporaryCredentials, ProviderError> {
        debug!(
            "sts:AssumeRole role_arn:{} session:{} mfa:{}",
            request.role_arn,
            request.role_session_name,
            request.serial_number.is_some()
        );

        let output = self
            .sts
            .assume_role(request)
            .await
            .map_err(|e| classify("AssumeRole", e))?;
        let creds = output
            .credentials
            .ok_or_else(|| ProviderError::other("assume-role didn't return a credential"))?;

        Ok(TemporaryCredentials {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_access_key,
            session_token: creds.session_token,
            expires: parse_expiration(&creds.expiration)?,
        })
    }
}

#[async_trait]
impl IdentityProvider for RusotoIdentityProvider {
    async fn current_principal_arn(&self) -> Result<String, ProviderError> {
        let output = self
            .sts
            .get_caller_identity(GetCallerIdentityRequest {})
            .await
            .map_err(|e| classify("GetCallerIdentity", e))?;
        output
            .arn
            .ok_or_else(|| ProviderError::other("get-caller-identity didn't return an ARN"))
    }

    async fn username(&self) -> Result<String, ProviderError> {
        let output = self
            .iam
            .get_user(GetUserRequest { user_name: None })
            .await
            .map_err(|e| classify("GetUser", e))?;
        Ok(output.user.user_name)
    }

    async fn mfa_devices(&self) -> Result<Vec<String>, ProviderError> {
        let mut serials = Vec::new();
        let mut marker = None;
        loop {
            let output = self
                .iam
                .list_mfa_devices(ListMFADevicesRequest {
                    marker: marker.take(),
                    ..Default::default()
                })
                .await
                .map_err(|e| classify("ListMFADevices", e))?;

            serials.extend(output.mfa_devices.into_iter().map(|d| d.serial_number));
            match (output.is_truncated, output.marker) {
                (Some(true), Some(next)) => marker = Some(next),
                _ => break,
            }
        }

        Ok(serials)
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> Result<TemporaryCredentials, ProviderError> {
        self.sts_assume_role(AssumeRoleRequest {
            role_arn: role_arn.to_string(),
            role_session_name: session_name.to_string(),
            duration_seconds: self.duration_seconds,
            ..Default::default()
        })
        .await
    }

    async fn assume_role_with_mfa(
        &self,
        role_arn: &str,
        session_name: &str,
        mfa_serial: &str,
        token_code: &str,
    ) -> Result<TemporaryCredentials, ProviderError> {
        self.sts_assume_role(AssumeRoleRequest {
            role_arn: role_arn.to_string(),
            role_session_name: session_name.to_string(),
            serial_number: Some(mfa_serial.to_string()),
            token_code: Some(token_code.to_string()),
            duration_seconds: self.duration_seconds,
            ..Default::default()
        })
        .await
    }
}

fn classify<E: std::error::Error + 'static>(call: &str, err: RusotoError<E>) -> ProviderError {
    let access_denied = match &err {
        RusotoError::Unknown(response) => is_access_denied_body(&response.body_as_str()),
        _ => false,
    };

    let message = format!("{}: {}", call, err);
    if access_denied {
        ProviderError::access_denied(message)
    } else {
        ProviderError::other(message)
    }
}

// STS reports a denied AssumeRole as an untyped error response with this code.
fn is_access_denied_body(body: &str) -> bool {
    body.contains("<Code>AccessDenied</Code>") || body.contains("\"AccessDenied\"")
}

fn parse_expiration(s: &str) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProviderError::other(format!("invalid expiration {:?}: {}", s, e)))
}
