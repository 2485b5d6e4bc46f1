// Session expiration arithmetic
//
// The access token's advertised lifetime is shortened by a safety slack
// and capped by the refresh cycle, so callers refresh well before the
// server starts rejecting the token.

use chrono::{DateTime, TimeDelta, Utc};

/// Seconds shaved off the advertised token lifetime.
pub const EXPIRATION_SLACK_SECS: i64 = 600;

/// Upper bound on how long a session is trusted without a refresh.
pub const REFRESH_CYCLE_SECS: i64 = 3600;

/// Source of wall-clock time.
///
/// Only expiration math and "is the session still usable" comparisons
/// read the clock; tests substitute a fixed instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Compute the instant at which a fresh session should be considered stale.
///
/// Returns `now + min(lifetime - slack, refresh_cycle)`, never earlier
/// than `now`.
pub fn compute_expiration(
    lifetime_secs: i64,
    slack_secs: i64,
    refresh_cycle_secs: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let margin = lifetime_secs
        .saturating_sub(slack_secs)
        .min(refresh_cycle_secs)
        .max(0);
    TimeDelta::try_seconds(margin)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
