use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ini::{Ini, Properties};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info};

use assume_role_schema::credentials::TemporaryCredentials;
use assume_role_schema::profile::ProfileConfiguration;

use crate::profile::store::ProfileStore;

mod keys {
    pub const ROLE_ARN: &str = "assume_role_arn";
    pub const ROLE_SESSION_NAME: &str = "assume_role_session_name";
    pub const MFA_SERIAL: &str = "assume_role_mfa_serial";
    pub const EXPIRATION: &str = "assume_role_expiration";

    pub const ACCESS_KEY_ID: &str = "aws_access_key_id";
    pub const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
    pub const SESSION_TOKEN: &str = "aws_session_token";
    pub const SESSION_EXPIRATION: &str = "aws_session_expiration";
}

/// Stores profiles in the AWS shared config and credentials files, so a
/// cached profile can be used with `AWS_PROFILE=<key>` by other tools.
///
/// Every write replaces the whole file atomically. Sections and keys the
/// store does not own survive a write; comments do not.
#[derive(Debug, Clone)]
pub struct IniProfileStore {
    config_path: PathBuf,
    credentials_path: PathBuf,
}

impl IniProfileStore {
    pub fn new(config_path: impl Into<PathBuf>, credentials_path: impl Into<PathBuf>) -> Self {
        IniProfileStore {
            config_path: config_path.into(),
            credentials_path: credentials_path.into(),
        }
    }

    /// Respects `AWS_CONFIG_FILE` and `AWS_SHARED_CREDENTIALS_FILE`, otherwise
    /// uses `~/.aws/config` and `~/.aws/credentials`.
    pub fn from_env() -> anyhow::Result<Self> {
        let aws_dir = || {
            dirs::home_dir()
                .map(|home| home.join(".aws"))
                .context("Failed to determine the home directory")
        };

        let config_path = match env::var_os("AWS_CONFIG_FILE") {
            Some(path) => PathBuf::from(path),
            None => aws_dir()?.join("config"),
        };
        let credentials_path = match env::var_os("AWS_SHARED_CREDENTIALS_FILE") {
            Some(path) => PathBuf::from(path),
            None => aws_dir()?.join("credentials"),
        };

        Ok(IniProfileStore::new(config_path, credentials_path))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }
}

fn config_section(key: &str) -> String {
    if key == "default" {
        key.to_string()
    } else {
        format!("profile {}", key)
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_time(section: &Properties, key: &str) -> anyhow::Result<DateTime<Utc>> {
    let value = section.get(key).with_context(|| format!("{} not found", key))?;
    let time = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Failed to parse {}: {}", key, value))?;
    Ok(time.with_timezone(&Utc))
}

async fn load_ini(path: &Path) -> anyhow::Result<Ini> {
    if !path.exists() {
        return Ok(Ini::new());
    }
    Ini::load_from_file(path).with_context(|| format!("Failed to read {}", path.display()))
}

async fn save_ini(path: &Path, ini: &Ini) -> anyhow::Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut staged = private_temp_file(&dir)?;
    ini.write_to(staged.as_file_mut())
        .and_then(|_| staged.as_file().sync_all())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    debug!("saved {}", path.display());
    Ok(())
}

/// A file in `dir` that only the owner can read from the moment it exists.
/// It is renamed over the target once fully written.
fn private_temp_file(dir: &Path) -> anyhow::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".assume-role-").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o600));
    }

    builder
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))
}

#[async_trait]
impl ProfileStore for IniProfileStore {
    async fn get_profile(&self, key: &str) -> anyhow::Result<Option<ProfileConfiguration>> {
        let ini = load_ini(&self.config_path).await?;
        let section = match ini.section(Some(config_section(key))) {
            Some(section) => section,
            None => return Ok(None),
        };

        // A profile written by hand rather than by us.
        let role_arn = match section.get(keys::ROLE_ARN) {
            Some(role_arn) => role_arn.to_string(),
            None => {
                debug!("profile {} has no cached role", key);
                return Ok(None);
            }
        };

        Ok(Some(ProfileConfiguration {
            role_arn,
            role_session_name: section
                .get(keys::ROLE_SESSION_NAME)
                .unwrap_or_default()
                .to_string(),
            mfa_serial: section
                .get(keys::MFA_SERIAL)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            expires: parse_time(section, keys::EXPIRATION)
                .with_context(|| format!("Invalid profile '{}'", key))?,
        }))
    }

    async fn set_profile(&self, key: &str, profile: &ProfileConfiguration) -> anyhow::Result<()> {
        let mut ini = load_ini(&self.config_path).await?;
        let section_name = config_section(key);

        ini.with_section(Some(section_name.as_str()))
            .set(keys::ROLE_ARN, profile.role_arn.as_str())
            .set(keys::ROLE_SESSION_NAME, profile.role_session_name.as_str())
            .set(keys::EXPIRATION, format_time(profile.expires));

        match profile.mfa_serial() {
            Some(serial) => {
                ini.with_section(Some(section_name.as_str()))
                    .set(keys::MFA_SERIAL, serial);
            }
            None => {
                if let Some(section) = ini.section_mut(Some(section_name.as_str())) {
                    section.remove(keys::MFA_SERIAL);
                }
            }
        }

        save_ini(&self.config_path, &ini).await?;
        info!("Profile saved: {}", key);
        Ok(())
    }

    async fn get_credentials(&self, key: &str) -> anyhow::Result<Option<TemporaryCredentials>> {
        let ini = load_ini(&self.credentials_path).await?;
        let section = match ini.section(Some(key)) {
            Some(section) => section,
            None => return Ok(None),
        };

        let field = |name: &str| {
            section
                .get(name)
                .map(|s| s.to_string())
                .with_context(|| format!("{} not found in profile '{}'", name, key))
        };

        Ok(Some(TemporaryCredentials {
            access_key_id: field(keys::ACCESS_KEY_ID)?,
            secret_access_key: field(keys::SECRET_ACCESS_KEY)?,
            session_token: field(keys::SESSION_TOKEN)?,
            expires: parse_time(section, keys::SESSION_EXPIRATION)
                .with_context(|| format!("Invalid credentials for profile '{}'", key))?,
        }))
    }

    async fn set_credentials(
        &self,
        key: &str,
        credentials: &TemporaryCredentials,
    ) -> anyhow::Result<()> {
        let mut ini = load_ini(&self.credentials_path).await?;

        ini.with_section(Some(key))
            .set(keys::ACCESS_KEY_ID, credentials.access_key_id())
            .set(keys::SECRET_ACCESS_KEY, credentials.secret_access_key())
            .set(keys::SESSION_TOKEN, credentials.session_token())
            .set(keys::SESSION_EXPIRATION, format_time(credentials.expires));

        save_ini(&self.credentials_path, &ini).await?;
        info!("Credentials saved to profile: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn store(dir: &tempfile::TempDir) -> IniProfileStore {
        IniProfileStore::new(
            dir.path().join("aws").join("config"),
            dir.path().join("aws").join("credentials"),
        )
    }

    fn credentials() -> TemporaryCredentials {
        TemporaryCredentials {
            access_key_id: "ABC123".to_string(),
            secret_access_key: "supersecret".to_string(),
            session_token: "123tok".to_string(),
            expires: Utc.with_ymd_and_hms(2018, 4, 23, 23, 45, 43).unwrap(),
        }
    }

    #[tokio::test]
    async fn missing_files_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        assert_eq!(store.get_profile("000000000000-testRole").await.unwrap(), None);
        assert_eq!(
            store.get_credentials("000000000000-testRole").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn stores_profiles_and_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let creds = credentials();
        let profile = ProfileConfiguration::for_credentials(
            "arn:aws:iam::000000000000:role/testRole",
            "bob",
            Some("arn:aws:iam::000000000000:mfa/bob".to_string()),
            &creds,
        );

        store.set_profile("000000000000-testRole", &profile).await.unwrap();
        store.set_credentials("000000000000-testRole", &creds).await.unwrap();

        assert_eq!(
            store.get_profile("000000000000-testRole").await.unwrap(),
            Some(profile)
        );
        assert_eq!(
            store.get_credentials("000000000000-testRole").await.unwrap(),
            Some(creds)
        );

        let config = std::fs::read_to_string(store.config_path()).unwrap();
        assert!(config.contains("[profile 000000000000-testRole]"));
        let credentials = std::fs::read_to_string(store.credentials_path()).unwrap();
        assert!(credentials.contains("[000000000000-testRole]"));
    }

    #[tokio::test]
    async fn overwriting_drops_stale_mfa_serial() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let creds = credentials();

        let with_mfa = ProfileConfiguration::for_credentials(
            "arn:aws:iam::000000000000:role/testRole",
            "bob",
            Some("arn:aws:iam::000000000000:mfa/bob".to_string()),
            &creds,
        );
        store.set_profile("k", &with_mfa).await.unwrap();

        let without_mfa = ProfileConfiguration {
            mfa_serial: None,
            ..with_mfa
        };
        store.set_profile("k", &without_mfa).await.unwrap();

        assert_eq!(store.get_profile("k").await.unwrap(), Some(without_mfa));
    }

    #[tokio::test]
    async fn keeps_unrelated_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(dir.path().join("aws")).unwrap();
        std::fs::write(
            store.config_path(),
            "[default]\nregion = us-west-2\n\n[profile handwritten]\nregion = eu-west-1\n",
        )
        .unwrap();

        assert_eq!(store.get_profile("handwritten").await.unwrap(), None);

        let creds = credentials();
        let profile = ProfileConfiguration::for_credentials("arn", "bob", None, &creds);
        store.set_profile("cached", &profile).await.unwrap();

        let ini = Ini::load_from_file(store.config_path()).unwrap();
        assert_eq!(
            ini.section(Some("default")).and_then(|s| s.get("region")),
            Some("us-west-2")
        );
        assert_eq!(
            ini.section(Some("profile handwritten"))
                .and_then(|s| s.get("region")),
            Some("eu-west-1")
        );
    }

    #[tokio::test]
    async fn rewrite_keeps_long_lived_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(dir.path().join("aws")).unwrap();
        std::fs::write(
            store.credentials_path(),
            "[default]\naws_access_key_id = AKIAEXAMPLE\naws_secret_access_key = longlived\n",
        )
        .unwrap();

        store.set_credentials("k", &credentials()).await.unwrap();

        let ini = Ini::load_from_file(store.credentials_path()).unwrap();
        let default = ini.section(Some("default")).unwrap();
        assert_eq!(default.get("aws_access_key_id"), Some("AKIAEXAMPLE"));
        assert_eq!(default.get("aws_secret_access_key"), Some("longlived"));
        assert_eq!(
            store.get_credentials("k").await.unwrap(),
            Some(credentials())
        );

        let leftovers = std::fs::read_dir(dir.path().join("aws"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect::<Vec<_>>();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("credentials")]);
    }

    #[cfg(unix)]
    #[test]
    fn staged_file_is_private_before_anything_is_written() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let staged = private_temp_file(dir.path()).unwrap();

        let metadata = staged.as_file().metadata().unwrap();
        assert_eq!(metadata.len(), 0);
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        assert_eq!(staged.path().parent(), Some(dir.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn restricts_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(dir.path().join("aws")).unwrap();
        std::fs::write(store.credentials_path(), "[default]\nregion = us-west-2\n").unwrap();
        std::fs::set_permissions(
            store.credentials_path(),
            std::fs::Permissions::from_mode(0o644),
        )
        .unwrap();

        store.set_credentials("k", &credentials()).await.unwrap();

        let mode = std::fs::metadata(store.credentials_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
