//! `grpc-timeout` header parsing and formatting (§6 of the gRPC HTTP/2
//! mapping): ASCII digits followed by a one-character unit.

use std::time::Duration;

/// Parses a `grpc-timeout` header value, e.g. `"100m"` for 100 milliseconds.
pub fn parse(value: &str) -> Option<Duration> {
    if value.is_empty() || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;

    let nanos_per_unit: u64 = match unit {
        "n" => 1,
        "u" => 1_000,
        "m" => 1_000_000,
        "S" => 1_000_000_000,
        "M" => 60 * 1_000_000_000,
        "H" => 3_600 * 1_000_000_000,
        _ => return None,
    };

    Some(Duration::from_nanos(amount.saturating_mul(nanos_per_unit)))
}

/// Formats a deadline as a `grpc-timeout` value, picking the coarsest unit
/// that still fits the encoded digits within the 8-digit wire limit.
pub fn format(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos < 100_000_000 {
        return format!("{}n", nanos.min(99_999_999));
    }
    let micros = d.as_micros();
    if micros < 100_000_000 {
        return format!("{}u", micros);
    }
    let millis = d.as_millis();
    if millis < 100_000_000 {
        return format!("{}m", millis);
    }
    let secs = d.as_secs();
    if secs < 100_000_000 {
        return format!("{}S", secs);
    }
    let mins = secs / 60;
    if mins < 100_000_000 {
        return format!("{}M", mins);
    }
    format!("{}H", secs / 3_600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse("100m"), Some(Duration::from_millis(100)));
        assert_eq!(parse("50m"), Some(Duration::from_millis(50)));
        assert_eq!(parse("2S"), Some(Duration::from_secs(2)));
        assert_eq!(parse("1H"), Some(Duration::from_secs(3_600)));
        assert_eq!(parse(""), None);
        assert_eq!(parse("100x"), None);
    }

    #[test]
    fn format_round_trips_millis() {
        let d = Duration::from_millis(250);
        let formatted = format(d);
        assert_eq!(parse(&formatted), Some(d));
    }
}
