pub mod store;

pub use assume_role_schema::profile::ProfileConfiguration;
pub use store::ProfileStore;

/// Cache key for a role: `{prefix-or-account_id}-{role_name}`.
///
/// A non-empty prefix stands in for the account ID so an account can be
/// aliased to a friendlier local name.
pub fn derive_profile_key(account_id: &str, role_name: &str, prefix: Option<&str>) -> String {
    let namespace = prefix.filter(|p| !p.is_empty()).unwrap_or(account_id);
    format!("{}-{}", namespace, role_name)
}
