use chrono::{DateTime, Duration, Utc};

#[derive(Clone, Debug)]
pub struct ExpiryConfig {
    pub default_timeout_minutes: u32,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            default_timeout_minutes: 15,
        }
    }
}

/// Oldest creation instant that survives a purge at `now`.
pub fn expiry_cutoff(now: DateTime<Utc>, timeout_minutes: u32) -> DateTime<Utc> {
    now - Duration::minutes(timeout_minutes as i64)
}

/// A location exactly at the cutoff is kept.
///
/// `database::purge_expired` applies this same rule in SQL against `expiry_cutoff`.
pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, timeout_minutes: u32) -> bool {
    created_at < expiry_cutoff(now, timeout_minutes)
}
