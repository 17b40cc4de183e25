use tracing::{debug, info};

use assume_role_schema::credentials::TemporaryCredentials;
use assume_role_schema::profile::ProfileConfiguration;

use crate::arn::Arn;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::expiry::is_stale;
use crate::mfa::ReadMfaToken;
use crate::profile::{derive_profile_key, ProfileStore};
use crate::provider::{IdentityProvider, ProviderError};

/// A single role-assumption request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssumeRoleParameters {
    /// Bare role name in the caller's account, or a full role ARN.
    pub user_role: String,
    pub role_session_name: Option<String>,
}

impl AssumeRoleParameters {
    pub fn new(user_role: impl Into<String>) -> Self {
        AssumeRoleParameters {
            user_role: user_role.into(),
            role_session_name: None,
        }
    }

    pub fn with_role_session_name(mut self, role_session_name: Option<String>) -> Self {
        self.role_session_name = role_session_name.filter(|s| !s.is_empty());
        self
    }
}

/// Where the credentials for a request live and which role they are for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTarget {
    pub role_arn: String,
    pub profile_key: String,
}

impl RoleTarget {
    /// Resolves a role name or ARN against the current principal.
    ///
    /// The prefix only applies to bare role names; a full ARN is keyed by its
    /// own account.
    pub fn resolve(user_role: &str, principal: &Arn, prefix: Option<&str>) -> Result<RoleTarget> {
        if Arn::looks_like_arn(user_role) {
            let arn = Arn::parse(user_role)?;
            let role_name = arn
                .role_name()
                .ok_or_else(|| Error::InvalidArn(user_role.to_string()))?;
            return Ok(RoleTarget {
                role_arn: user_role.to_string(),
                profile_key: derive_profile_key(arn.account_id(), role_name, None),
            });
        }

        let account_id = principal.account_id();
        Ok(RoleTarget {
            role_arn: Arn::role(principal.partition(), account_id, user_role).to_string(),
            profile_key: derive_profile_key(account_id, user_role, prefix),
        })
    }
}

/// Obtains role credentials, reusing cached ones until they come within the
/// refresh horizon of their expiry.
pub struct RoleAssumer<P, S, R, C> {
    provider: P,
    store: S,
    mfa_reader: R,
    clock: C,
    config: Config,
}

impl<P, S, R, C> RoleAssumer<P, S, R, C>
where
    P: IdentityProvider,
    S: ProfileStore,
    R: ReadMfaToken,
    C: Clock,
{
    pub fn new(provider: P, store: S, mfa_reader: R, clock: C, config: Config) -> Self {
        RoleAssumer {
            provider,
            store,
            mfa_reader,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn current_principal(&self) -> Result<Arn> {
        let arn = self
            .provider
            .current_principal_arn()
            .await
            .map_err(Error::lookup("the current principal"))?;
        debug!("current principal: {}", arn);
        Arn::parse(&arn)
    }

    pub async fn current_principal_is_assumed_role(&self) -> Result<bool> {
        Ok(self.current_principal().await?.is_assumed_role())
    }

    async fn session_name(&self, principal: &Arn, requested: Option<&str>) -> Result<String> {
        if let Some(name) = requested {
            return Ok(name.to_string());
        }
        // GetUser is not available to role sessions.
        if let Some(name) = principal.session_name() {
            return Ok(name.to_string());
        }
        self.provider
            .username()
            .await
            .map_err(Error::lookup("the IAM user name"))
    }

    async fn cached_credentials(&self, profile_key: &str) -> Result<Option<TemporaryCredentials>> {
        let profile = self
            .store
            .get_profile(profile_key)
            .await
            .map_err(|e| Error::store("read profile", profile_key, e))?;

        let profile = match profile {
            Some(profile) => profile,
            None => {
                debug!("no cached profile: {}", profile_key);
                return Ok(None);
            }
        };

        let now = self.clock.now();
        if is_stale(profile.expires, now, self.config.refresh_before_expiry) {
            info!(
                "cached credentials for {} expire at {}, refreshing",
                profile_key, profile.expires
            );
            return Ok(None);
        }

        let credentials = self
            .store
            .get_credentials(profile_key)
            .await
            .map_err(|e| Error::store("read credentials", profile_key, e))?;
        if credentials.is_none() {
            debug!("profile {} has no cached credentials", profile_key);
        }
        Ok(credentials)
    }

    pub async fn assume_role(&self, params: &AssumeRoleParameters) -> Result<TemporaryCredentials> {
        let principal = self.current_principal().await?;
        let session_name = self
            .session_name(&principal, params.role_session_name.as_deref())
            .await?;

        let target = RoleTarget::resolve(
            &params.user_role,
            &principal,
            self.config.profile_name_prefix(),
        )?;
        debug!(
            "role_arn:{} profile:{} session:{}",
            target.role_arn, target.profile_key, session_name
        );

        if let Some(credentials) = self.cached_credentials(&target.profile_key).await? {
            info!("using cached credentials for {}", target.profile_key);
            return Ok(credentials);
        }

        let (credentials, mfa_serial) = if principal.is_assumed_role() {
            let credentials = self
                .provider
                .assume_role(&target.role_arn, &session_name)
                .await
                .map_err(Error::AssumeRole)?;
            (credentials, None)
        } else {
            match self
                .provider
                .assume_role(&target.role_arn, &session_name)
                .await
            {
                Ok(credentials) => (credentials, None),
                Err(e) if e.is_access_denied() => {
                    info!("AssumeRole without MFA was denied, trying with MFA");
                    let (credentials, serial) = self
                        .assume_role_with_mfa(&target.role_arn, &session_name, e)
                        .await?;
                    (credentials, Some(serial))
                }
                Err(e) => return Err(Error::NonMfaAssumeRole(e)),
            }
        };

        let profile = ProfileConfiguration::for_credentials(
            target.role_arn,
            session_name,
            mfa_serial,
            &credentials,
        );
        self.store
            .set_profile(&target.profile_key, &profile)
            .await
            .map_err(|e| Error::store("write profile", &target.profile_key, e))?;
        self.store
            .set_credentials(&target.profile_key, &credentials)
            .await
            .map_err(|e| Error::store("write credentials", &target.profile_key, e))?;

        info!(
            "assumed {} until {}",
            profile.role_arn, credentials.expires
        );
        Ok(credentials)
    }

    async fn assume_role_with_mfa(
        &self,
        role_arn: &str,
        session_name: &str,
        non_mfa: ProviderError,
    ) -> Result<(TemporaryCredentials, String)> {
        let devices = self
            .provider
            .mfa_devices()
            .await
            .map_err(Error::lookup("MFA devices"))?;
        if devices.is_empty() {
            return Err(Error::NoMfaDevices { non_mfa });
        }

        let serial = self.mfa_reader.select_mfa_device(&devices).await?;
        let token = self.mfa_reader.read_mfa_token(&serial).await?;

        match self
            .provider
            .assume_role_with_mfa(role_arn, session_name, &serial, &token)
            .await
        {
            Ok(credentials) => Ok((credentials, serial)),
            Err(mfa) => Err(Error::MfaAssumeRole { non_mfa, mfa }),
        }
    }
}
