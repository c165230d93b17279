//! Cadence and span parsing.
//!
//! The common form is `<number><unit>` with unit `h`, `m` or `s` in either
//! case. Anything else goes through a compound parser accepting `2d`,
//! `1h30m`, `90min`, `45 sec` and bare seconds.

use chrono::Duration;
use epochgate_core::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

fn simple_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<num>\d+(?:\.\d+)?)(?P<unit>[hHmMsS])$").ok())
        .as_ref()
}

fn compound_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?P<num>\d+(?:\.\d+)?)\s*(?P<unit>weeks?|w|days?|d|hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)",
        )
        .ok()
    })
    .as_ref()
}

/// Parse a cadence or span string into a duration.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(ConfigError::InvalidDuration(input.to_string()));
    }

    if let Some(caps) = simple_re().and_then(|re| re.captures(text)) {
        let num: f64 = caps["num"]
            .parse()
            .map_err(|_| ConfigError::InvalidDuration(input.to_string()))?;
        let unit = unit_seconds(&caps["unit"]).ok_or_else(|| ConfigError::InvalidDuration(input.to_string()))?;
        return to_duration(num * unit, input);
    }

    if let Ok(secs) = text.parse::<u64>() {
        return to_duration(secs as f64, input);
    }

    parse_compound(text).ok_or_else(|| ConfigError::InvalidDuration(input.to_string()))
}

fn parse_compound(text: &str) -> Option<Duration> {
    let mut total = 0.0_f64;
    let mut consumed = 0usize;
    for caps in compound_re()?.captures_iter(text) {
        let whole = caps.get(0)?;
        // Only whitespace may separate the pieces.
        if !text[consumed..whole.start()].trim().is_empty() {
            return None;
        }
        consumed = whole.end();
        let num: f64 = caps["num"].parse().ok()?;
        total += num * unit_seconds(&caps["unit"])?;
    }
    if consumed == 0 || !text[consumed..].trim().is_empty() {
        return None;
    }
    to_duration(total, text).ok()
}

fn unit_seconds(unit: &str) -> Option<f64> {
    let unit = unit.to_lowercase();
    let secs = match unit.as_str() {
        "w" | "week" | "weeks" => 7.0 * 86_400.0,
        "d" | "day" | "days" => 86_400.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        _ => return None,
    };
    Some(secs)
}

fn to_duration(secs: f64, input: &str) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs < 0.0 || secs > i64::MAX as f64 / 1_000.0 {
        return Err(ConfigError::InvalidDuration(input.to_string()));
    }
    Ok(Duration::milliseconds((secs * 1_000.0).round() as i64))
}
