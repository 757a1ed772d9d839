//! Time and ID helpers shared by every crate

use chrono::{SecondsFormat, Utc};

/// One day in milliseconds
pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC time as RFC 3339 with millisecond precision (`2026-01-01T00:00:00.000Z`)
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whole days elapsed between two millisecond timestamps, floored.
///
/// A `to` earlier than `from` yields 0.
pub fn whole_days_between(from: i64, to: i64) -> i64 {
    (to - from).max(0) / DAY_MILLIS
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms)
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}
