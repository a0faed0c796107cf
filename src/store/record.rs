//! Records, key normalization, and the timestamp stamping policy
//!
//! A record is a schemaless JSON object owned by whichever feature module
//! constructs it; this layer only stamps timestamps and never owns record
//! identity. Stamping is centralized here as one policy invoked uniformly
//! by every CRUD operation.

use parking_lot::Mutex;
use serde_json::Value;

/// A stored record: arbitrary field → value mapping.
pub type Record = serde_json::Map<String, Value>;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Normalize a primary-key or index value to its map key form.
///
/// Strings keep their content, numbers their decimal form; anything else
/// falls back to its JSON encoding. `Null` yields no key (the record is
/// simply not indexed under that path).
pub fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Which CRUD operation is stamping the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampMode {
    /// `create`: both timestamps default to now when absent on the input.
    Create,
    /// `put`: `updated_at` always refreshed; a caller-supplied
    /// `created_at` is preserved, otherwise stamped now.
    Upsert,
    /// `update`: `updated_at` always refreshed.
    Patch,
}

/// Apply the stamping policy to `record` with the timestamp `now`.
pub fn stamp(record: &mut Record, mode: StampMode, now: &str) {
    match mode {
        StampMode::Create => {
            record
                .entry(CREATED_AT.to_string())
                .or_insert_with(|| Value::String(now.to_string()));
            record
                .entry(UPDATED_AT.to_string())
                .or_insert_with(|| Value::String(now.to_string()));
        }
        StampMode::Upsert => {
            record
                .entry(CREATED_AT.to_string())
                .or_insert_with(|| Value::String(now.to_string()));
            record.insert(UPDATED_AT.to_string(), Value::String(now.to_string()));
        }
        StampMode::Patch => {
            record.insert(UPDATED_AT.to_string(), Value::String(now.to_string()));
        }
    }
}

/// Monotonic wall clock producing ISO-8601 strings.
///
/// Two stamps taken back to back are guaranteed to differ, so
/// `updated_at` is strictly later than `created_at` after any update even
/// when both land within one microsecond tick.
#[derive(Debug)]
pub struct Clock {
    last: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
}

impl Clock {
    pub fn new() -> Self {
        Self { last: Mutex::new(None) }
    }

    /// Current time as an RFC 3339 string with microsecond precision,
    /// strictly greater than every string previously returned.
    pub fn now_iso(&self) -> String {
        use chrono::{Duration, SecondsFormat, Utc};

        let mut last = self.last.lock();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
