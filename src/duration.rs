//! Duration strings in the `AhBmCs` family, with bare integers read as seconds.

use std::time::Duration;

pub const FORMAT_HINT: &str = "Use 'AhBmCs' duration format";

/// Longest units first so `ms` is not read as `m`
const UNITS: &[&str] = &["ns", "us", "µs", "ms", "h", "m", "s"];

#[derive(Debug, thiserror::Error)]
pub enum DurationError {
    #[error("{0:?} is not an 'AhBmCs' duration")]
    Format(String),
    #[error(transparent)]
    Parse(#[from] humantime::DurationError),
}

/// Append the seconds unit to a bare non-negative integer, in place.
pub fn normalize(value: &mut String) {
    if value.parse::<u64>().is_ok() {
        value.push('s');
    }
}

pub fn parse(value: &str) -> Result<Duration, DurationError> {
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    if !is_unit_runs(value) {
        return Err(DurationError::Format(value.to_string()));
    }
    Ok(humantime::parse_duration(value)?)
}

/// `1h30m`, `250ms`: one or more integer-unit pairs and nothing else.
fn is_unit_runs(value: &str) -> bool {
    let mut rest = value;
    while !rest.is_empty() {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
        let Some(unit) = UNITS.iter().find(|unit| rest.starts_with(*unit)) else {
            return false;
        };
        rest = &rest[unit.len()..];
    }
    !value.is_empty()
}

/// Normalize `value` and report it as `<field>: "<value>" <invalid> (...)` if it fails to parse.
pub fn check(field: &str, value: &mut String) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    normalize(value);
    parse(value)
        .err()
        .map(|_| format!("{field}: {value:?} <invalid> ({FORMAT_HINT})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("5", "5s", None)]
    #[case("1h2m3s", "1h2m3s", None)]
    #[case("", "", None)]
    #[case("5x", "5x", Some("delay: \"5x\" <invalid> (Use 'AhBmCs' duration format)"))]
    #[case("-5", "-5", Some("delay: \"-5\" <invalid> (Use 'AhBmCs' duration format)"))]
    #[case("2 days", "2 days", Some("delay: \"2 days\" <invalid> (Use 'AhBmCs' duration format)"))]
    #[case("5min", "5min", Some("delay: \"5min\" <invalid> (Use 'AhBmCs' duration format)"))]
    #[case("1week", "1week", Some("delay: \"1week\" <invalid> (Use 'AhBmCs' duration format)"))]
    fn check_normalizes_then_validates(
        #[case] input: &str,
        #[case] normalized: &str,
        #[case] expected: Option<&str>,
    ) {
        let mut value = input.to_string();

        let result = check("delay", &mut value);

        assert_eq!(value, normalized);
        assert_eq!(result.as_deref(), expected);
    }

    #[rstest]
    #[case("30", Duration::from_secs(30))]
    #[case("10m", Duration::from_secs(600))]
    #[case("1h30m", Duration::from_secs(5400))]
    #[case("250ms", Duration::from_millis(250))]
    fn parse_reads_integers_as_seconds(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse(input).unwrap(), expected);
    }
}
