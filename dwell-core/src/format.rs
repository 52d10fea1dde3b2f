//! Formatting helpers shared across front ends.

use chrono::{DateTime, FixedOffset};

use crate::time::{
    MILLISECONDS_PER_DAY, MILLISECONDS_PER_HOUR, MILLISECONDS_PER_MINUTE, MILLISECONDS_PER_SECOND,
};

/// Format a millisecond duration as `"1d 2h 3m 4s"`, skipping zero parts.
///
/// Sub-second remainders are dropped, so anything under a second is `""`.
pub fn format_duration(millis: i64) -> String {
    let mut rest = millis.max(0);
    let days = rest / MILLISECONDS_PER_DAY;
    rest %= MILLISECONDS_PER_DAY;
    let hours = rest / MILLISECONDS_PER_HOUR;
    rest %= MILLISECONDS_PER_HOUR;
    let minutes = rest / MILLISECONDS_PER_MINUTE;
    rest %= MILLISECONDS_PER_MINUTE;
    let seconds = rest / MILLISECONDS_PER_SECOND;

    [(days, "d"), (hours, "h"), (minutes, "m"), (seconds, "s")]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Translate a `yyyy-MM-dd` style pattern into a chrono format string.
///
/// Only the tokens used by the supported date and time formats are mapped.
pub fn to_chrono_pattern(pattern: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("dd", "%d"),
        ("d", "%-d"),
        ("HH", "%H"),
        ("H", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("a", "%p"),
    ];

    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

/// Format a timestamp with a `yyyy-MM-dd` style pattern.
pub fn format_with_pattern(ts: &DateTime<FixedOffset>, pattern: &str) -> String {
    ts.format(&to_chrono_pattern(pattern)).to_string()
}
