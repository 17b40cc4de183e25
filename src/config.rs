use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::Error;

pub const CONFIG_FILE_NAME: &str = "assume-role.yaml";

pub mod defaults {
    pub const REFRESH_BEFORE_EXPIRY_MINUTES: i64 = 15;
}

/// Process-wide policy, read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long before expiry cached credentials are treated as stale.
    #[serde(deserialize_with = "deserialize_duration")]
    pub refresh_before_expiry: Duration,

    /// Replaces the account ID when deriving profile keys for bare role names.
    #[serde(alias = "role_prefix")]
    pub profile_name_prefix: Option<String>,

    /// Requested session length, passed through to AssumeRole.
    pub duration_seconds: Option<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            refresh_before_expiry: Duration::minutes(defaults::REFRESH_BEFORE_EXPIRY_MINUTES),
            profile_name_prefix: None,
            duration_seconds: None,
        }
    }
}

impl Config {
    pub fn profile_name_prefix(&self) -> Option<&str> {
        self.profile_name_prefix.as_deref().filter(|p| !p.is_empty())
    }

    /// Loads the nearest `assume-role.yaml` above the working directory, or
    /// the defaults when there is none.
    pub fn load_default() -> Result<Config, Error> {
        let cwd = env::current_dir().map_err(|source| Error::ConfigRead {
            path: PathBuf::from("."),
            source,
        })?;

        match find_config_file(&cwd) {
            Some(path) => load_config(path),
            None => {
                debug!("no {} found, using defaults", CONFIG_FILE_NAME);
                Ok(Config::default())
            }
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
    let path = path.as_ref();
    debug!("loading config: {}", path.display());

    let yaml = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    if yaml.trim().is_empty() {
        return Ok(Config::default());
    }

    serde_yaml::from_str(&yaml).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Searches `start` and its ancestors for `assume-role.yaml`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(i64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let duration = match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(n) => seconds(n),
        RawDuration::Text(s) => parse_duration(&s),
    }
    .map_err(<D::Error as serde::de::Error>::custom)?;

    if duration < Duration::zero() {
        return Err(serde::de::Error::custom(format!(
            "refresh_before_expiry must not be negative, got {}",
            duration
        )));
    }
    Ok(duration)
}

fn seconds(n: i64) -> Result<Duration, String> {
    Duration::try_seconds(n).ok_or_else(|| format!("duration of {} seconds is out of range", n))
}

/// Parses Go-style durations such as `15m`, `1h30m`, `90s` or `500ms`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(n) = s.parse::<i64>() {
        return seconds(n);
    }

    let mut total = Duration::zero();
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("invalid duration {:?}", s));
        }
        let value = rest[..digits]
            .parse::<i64>()
            .map_err(|e| format!("invalid duration {:?}: {}", s, e))?;
        rest = &rest[digits..];

        let unit = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit] {
            "h" => Duration::try_hours(value),
            "m" => Duration::try_minutes(value),
            "s" => Duration::try_seconds(value),
            "ms" => Duration::try_milliseconds(value),
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, s)),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(|| format!("duration {:?} is out of range", s))?;
        rest = &rest[unit..];
    }

    Ok(total)
}
