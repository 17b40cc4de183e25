pub mod arn;
pub mod assume_role;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod handler;
pub mod mfa;
pub mod profile;
pub mod provider;
pub mod run;

pub use assume_role_schema::credentials::TemporaryCredentials;
pub use assume_role_schema::profile::ProfileConfiguration;
pub use error::{Error, Result};
