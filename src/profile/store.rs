use async_trait::async_trait;

use assume_role_schema::credentials::TemporaryCredentials;
use assume_role_schema::profile::ProfileConfiguration;

pub mod ini;

/// Local persistence of profile metadata and cached credentials.
///
/// Writing a key replaces whatever was stored under it before.
#[async_trait]
pub trait ProfileStore {
    /// `Ok(None)` when nothing is stored under `key`.
    async fn get_profile(&self, key: &str) -> anyhow::Result<Option<ProfileConfiguration>>;

    async fn set_profile(&self, key: &str, profile: &ProfileConfiguration) -> anyhow::Result<()>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn get_credentials(&self, key: &str) -> anyhow::Result<Option<TemporaryCredentials>>;

    async fn set_credentials(
        &self,
        key: &str,
        credentials: &TemporaryCredentials,
    ) -> anyhow::Result<()>;
}
