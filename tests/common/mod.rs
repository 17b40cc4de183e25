#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use assume_role::assume_role::RoleAssumer;
use assume_role::clock::FixedClock;
use assume_role::config::Config;
use assume_role::mfa::StreamMfaTokenReader;
use assume_role::profile::ProfileStore;
use assume_role::provider::{IdentityProvider, ProviderError};
use assume_role::{ProfileConfiguration, TemporaryCredentials};

pub const USER_ARN: &str = "arn:aws:iam::000000000000:user/bob";
pub const ASSUMED_ROLE_ARN: &str = "arn:aws:sts::000000000000:assumed-role/testRole/bob";
pub const ROLE_ARN: &str = "arn:aws:iam::000000000000:role/testRole";
pub const MFA_SERIAL: &str = "arn:aws:iam::000000000000:mfa/bob";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 4, 23, 23, 45, 43).unwrap()
}

pub fn credentials() -> TemporaryCredentials {
    TemporaryCredentials {
        access_key_id: "ABC123".to_string(),
        secret_access_key: "supersecret".to_string(),
        session_token: "123tok".to_string(),
        expires: now() + Duration::hours(1),
    }
}

pub fn other_credentials() -> TemporaryCredentials {
    TemporaryCredentials {
        access_key_id: "DEF456".to_string(),
        secret_access_key: "othersecret".to_string(),
        session_token: "456tok".to_string(),
        expires: now() + Duration::hours(1),
    }
}

pub fn access_denied() -> ProviderError {
    ProviderError::access_denied("Not authorized to perform sts:AssumeRole")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentPrincipalArn,
    Username,
    MfaDevices,
    AssumeRole {
        role_arn: String,
        session_name: String,
    },
    AssumeRoleWithMfa {
        role_arn: String,
        session_name: String,
        mfa_serial: String,
        token_code: String,
    },
}

impl Call {
    pub fn assume_role(role_arn: &str, session_name: &str) -> Call {
        Call::AssumeRole {
            role_arn: role_arn.to_string(),
            session_name: session_name.to_string(),
        }
    }

    pub fn assume_role_with_mfa(
        role_arn: &str,
        session_name: &str,
        mfa_serial: &str,
        token_code: &str,
    ) -> Call {
        Call::AssumeRoleWithMfa {
            role_arn: role_arn.to_string(),
            session_name: session_name.to_string(),
            mfa_serial: mfa_serial.to_string(),
            token_code: token_code.to_string(),
        }
    }

    pub fn is_assumption(&self) -> bool {
        matches!(self, Call::AssumeRole { .. } | Call::AssumeRoleWithMfa { .. })
    }
}

/// Scripted identity provider that records every call.
pub struct FakeProvider {
    pub principal_arn: Result<String, ProviderError>,
    pub username: Result<String, ProviderError>,
    pub mfa_devices: Result<Vec<String>, ProviderError>,
    pub assume_role: Result<TemporaryCredentials, ProviderError>,
    pub assume_role_with_mfa: Result<TemporaryCredentials, ProviderError>,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeProvider {
    pub fn new(principal_arn: &str) -> Self {
        FakeProvider {
            principal_arn: Ok(principal_arn.to_string()),
            username: Ok("bob".to_string()),
            mfa_devices: Ok(vec![MFA_SERIAL.to_string()]),
            assume_role: Ok(credentials()),
            assume_role_with_mfa: Ok(credentials()),
            calls: Arc::default(),
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn current_principal_arn(&self) -> Result<String, ProviderError> {
        self.record(Call::CurrentPrincipalArn);
        self.principal_arn.clone()
    }

    async fn username(&self) -> Result<String, ProviderError> {
        self.record(Call::Username);
        self.username.clone()
    }

    async fn mfa_devices(&self) -> Result<Vec<String>, ProviderError> {
        self.record(Call::MfaDevices);
        self.mfa_devices.clone()
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> Result<TemporaryCredentials, ProviderError> {
        self.record(Call::assume_role(role_arn, session_name));
        self.assume_role.clone()
    }

    async fn assume_role_with_mfa(
        &self,
        role_arn: &str,
        session_name: &str,
        mfa_serial: &str,
        token_code: &str,
    ) -> Result<TemporaryCredentials, ProviderError> {
        self.record(Call::assume_role_with_mfa(
            role_arn,
            session_name,
            mfa_serial,
            token_code,
        ));
        self.assume_role_with_mfa.clone()
    }
}

#[derive(Debug, Default)]
pub struct StoreState {
    pub profiles: HashMap<String, ProfileConfiguration>,
    pub credentials: HashMap<String, TemporaryCredentials>,
    pub profile_reads: usize,
    pub credential_reads: usize,
    pub writes: usize,
}

/// In-memory store; state is shared so tests can inspect it afterwards.
#[derive(Clone, Default)]
pub struct FakeStore {
    pub state: Arc<Mutex<StoreState>>,
    pub fail_writes: bool,
}

impl FakeStore {
    pub fn with_profile(self, key: &str, profile: ProfileConfiguration) -> Self {
        self.state
            .lock()
            .unwrap()
            .profiles
            .insert(key.to_string(), profile);
        self
    }

    pub fn with_credentials(self, key: &str, credentials: TemporaryCredentials) -> Self {
        self.state
            .lock()
            .unwrap()
            .credentials
            .insert(key.to_string(), credentials);
        self
    }

    pub fn profile(&self, key: &str) -> Option<ProfileConfiguration> {
        self.state.lock().unwrap().profiles.get(key).cloned()
    }

    pub fn credentials(&self, key: &str) -> Option<TemporaryCredentials> {
        self.state.lock().unwrap().credentials.get(key).cloned()
    }
}

#[async_trait]
impl ProfileStore for FakeStore {
    async fn get_profile(&self, key: &str) -> anyhow::Result<Option<ProfileConfiguration>> {
        let mut state = self.state.lock().unwrap();
        state.profile_reads += 1;
        Ok(state.profiles.get(key).cloned())
    }

    async fn set_profile(&self, key: &str, profile: &ProfileConfiguration) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("disk full");
        }
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state.profiles.insert(key.to_string(), profile.clone());
        Ok(())
    }

    async fn get_credentials(&self, key: &str) -> anyhow::Result<Option<TemporaryCredentials>> {
        let mut state = self.state.lock().unwrap();
        state.credential_reads += 1;
        Ok(state.credentials.get(key).cloned())
    }

    async fn set_credentials(
        &self,
        key: &str,
        credentials: &TemporaryCredentials,
    ) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("disk full");
        }
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state.credentials.insert(key.to_string(), credentials.clone());
        Ok(())
    }
}

/// Stands in for stderr.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub type TestPrompt = StreamMfaTokenReader<Cursor<Vec<u8>>, SharedBuffer>;
pub type TestAssumer = RoleAssumer<FakeProvider, FakeStore, TestPrompt, FixedClock>;

/// Everything a test needs to drive and inspect one engine.
pub struct Harness {
    pub assumer: TestAssumer,
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub store: FakeStore,
    pub stderr: SharedBuffer,
}

impl Harness {
    pub fn new(provider: FakeProvider, store: FakeStore, stdin: &str, config: Config) -> Self {
        let stderr = SharedBuffer::default();
        let prompt = StreamMfaTokenReader::new(
            Cursor::new(stdin.as_bytes().to_vec()),
            stderr.clone(),
        );
        let calls = provider.calls.clone();
        let assumer = RoleAssumer::new(
            provider,
            store.clone(),
            prompt,
            FixedClock::new(now()),
            config,
        );

        Harness {
            assumer,
            calls,
            store,
            stderr,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn assumption_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_assumption)
            .collect()
    }
}
