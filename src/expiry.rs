use chrono::{DateTime, Duration, Utc};

/// Whether cached credentials must be refreshed.
///
/// Credentials count as stale once `now + refresh_before_expiry` reaches their
/// expiry; the boundary itself is stale. A horizon reaching past the end of
/// representable time makes everything stale.
pub fn is_stale(expires: DateTime<Utc>, now: DateTime<Utc>, refresh_before_expiry: Duration) -> bool {
    match now.checked_add_signed(refresh_before_expiry) {
        Some(horizon) => horizon >= expires,
        None => true,
    }
}
