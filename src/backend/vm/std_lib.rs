use std::time::{SystemTime, UNIX_EPOCH};

use crate::common::object::Value;

/// Seconds since the epoch, for timing scripts. Registered by the host via
/// `define_native`; the core itself installs no globals.
pub fn native_clock(_args: &[Value]) -> Value {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Value::Number(now)
}
