//! Human-readable durations.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

use crate::{ConfigError, ConfigResult};

static DURATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*(ms|s|m|h|d)?\s*$").unwrap());

/// Parse `500ms`, `30s`, `10m`, `1h`, `2d`, or a bare number of seconds.
pub fn parse_duration(field: &str, input: &str) -> ConfigResult<Duration> {
    let caps = DURATION_REGEX.captures(input).ok_or_else(|| {
        ConfigError::invalid(field, format!("not a duration: {:?}", input))
    })?;

    let amount: u64 = caps[1]
        .parse()
        .map_err(|_| ConfigError::invalid(field, format!("number too large: {}", &caps[1])))?;

    let unit_secs = match caps.get(2).map(|m| m.as_str()) {
        Some("ms") => return Ok(Duration::from_millis(amount)),
        Some("s") | None => 1,
        Some("m") => 60,
        Some("h") => 60 * 60,
        Some("d") => 24 * 60 * 60,
        Some(other) => {
            return Err(ConfigError::invalid(field, format!("unknown unit: {}", other)));
        }
    };

    amount
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::invalid(field, format!("duration overflows: {}", input)))
}
