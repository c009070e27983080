//! Timestamp utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Oldest timestamp still inside a retention window ending now.
///
/// Windows too large for chrono saturate to the minimum representable time,
/// meaning nothing is ever considered expired.
pub fn retention_cutoff(retention: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(retention)
        .ok()
        .and_then(|window| now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
