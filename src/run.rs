use tracing::debug;

use crate::assume_role::{AssumeRoleParameters, RoleAssumer};
use crate::clock::Clock;
use crate::handler::{HandleCredentials, HandleCredentialsRequest};
use crate::mfa::ReadMfaToken;
use crate::profile::ProfileStore;
use crate::provider::IdentityProvider;

/// Assumes a role, then hands the credentials to a handler.
pub struct AssumeRoles<P, S, R, C, H> {
    assumer: RoleAssumer<P, S, R, C>,
    handler: H,
    region_name: Option<String>,
}

impl<P, S, R, C, H> AssumeRoles<P, S, R, C, H>
where
    P: IdentityProvider,
    S: ProfileStore,
    R: ReadMfaToken,
    C: Clock,
    H: HandleCredentials,
{
    pub fn new(assumer: RoleAssumer<P, S, R, C>, handler: H) -> Self {
        Self {
            assumer,
            handler,
            region_name: None,
        }
    }

    pub fn with_region_name(mut self, region_name: Option<String>) -> Self {
        self.region_name = region_name;
        self
    }

    pub async fn run(self, params: AssumeRoleParameters) -> anyhow::Result<()> {
        debug!("target role:{}", params.user_role);
        let credentials = self.assumer.assume_role(&params).await?;

        self.handler.handle_credentials(HandleCredentialsRequest {
            region_name: self.region_name.as_deref(),
            credentials: &credentials,
        })?;

        Ok(())
    }
}
