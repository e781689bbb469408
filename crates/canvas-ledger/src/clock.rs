//! Time source

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde_json::Value;

/// Source of "now" for ledger timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Stored representation of a timestamp field
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Whole calendar months from `from` to `to` (`year * 12 + month` arithmetic)
///
/// Negative when `to` is in an earlier month than `from`.
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    let index = |at: DateTime<Utc>| at.year() * 12 + at.month0() as i32;
    index(to) - index(from)
}
