// crates/cineloop-core/src/helpers/time.rs
//
// Time readouts and the direct-seek text grammar.
//
// All player times are whole milliseconds (`u64`). The UI shows either
// `HH:MM:SS` (total duration, seek hints) or `HH:MM:SS.mmm` (live readout).

use crate::error::ParseError;

const MS_PER_SEC:  u64 = 1_000;
const MS_PER_MIN:  u64 = 60 * MS_PER_SEC;
const MS_PER_HOUR: u64 = 60 * MS_PER_MIN;

/// Parse user-entered seek text into milliseconds.
///
/// Accepted shapes are `SS`, `MM:SS` and `HH:MM:SS`; every component is a
/// non-negative whole number. Components are not range-limited, so `"90"`
/// and `"1:30"` both mean ninety seconds. Surrounding whitespace is ignored.
///
/// ```
/// use cineloop_core::helpers::time::parse_time_spec;
/// assert_eq!(parse_time_spec("1:02:03"), Ok(3_723_000));
/// assert_eq!(parse_time_spec("90"),      Ok(90_000));
/// assert_eq!(parse_time_spec("2:05"),    Ok(125_000));
/// assert!(parse_time_spec("1.5").is_err());
/// ```
pub fn parse_time_spec(text: &str) -> Result<u64, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return Err(ParseError::TooManyParts { parts: parts.len() });
    }

    // Right-aligned: the last part is always seconds.
    const UNITS: [u64; 3] = [MS_PER_SEC, MS_PER_MIN, MS_PER_HOUR];
    let mut total: u64 = 0;
    for (part, unit) in parts.iter().rev().zip(UNITS) {
        let value = parse_component(part)?;
        total = value
            .checked_mul(unit)
            .and_then(|ms| total.checked_add(ms))
            .ok_or(ParseError::Overflow)?;
    }
    Ok(total)
}

/// `u64::from_str` accepts a leading `+`; the grammar does not.
fn parse_component(part: &str) -> Result<u64, ParseError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::NotANumber { part: part.to_string() });
    }
    part.parse::<u64>().map_err(|_| ParseError::Overflow)
}

/// Format milliseconds as `HH:MM:SS`, truncating sub-second precision.
///
/// ```
/// use cineloop_core::helpers::time::format_hms;
/// assert_eq!(format_hms(0),         "00:00:00");
/// assert_eq!(format_hms(3_723_999), "01:02:03");
/// ```
pub fn format_hms(ms: u64) -> String {
    let h = ms / MS_PER_HOUR;
    let m = (ms % MS_PER_HOUR) / MS_PER_MIN;
    let s = (ms % MS_PER_MIN) / MS_PER_SEC;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Format milliseconds as `HH:MM:SS.mmm`.
///
/// ```
/// use cineloop_core::helpers::time::format_hms_millis;
/// assert_eq!(format_hms_millis(61_005), "00:01:01.005");
/// ```
pub fn format_hms_millis(ms: u64) -> String {
    format!("{}.{:03}", format_hms(ms), ms % MS_PER_SEC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_formula_holds() {
        for (h, m, s) in [(0u64, 0u64, 0u64), (0, 7, 59), (2, 0, 1), (10, 59, 0), (123, 4, 5)] {
            let text = format!("{h}:{m}:{s}");
            assert_eq!(
                parse_time_spec(&text),
                Ok(h * 3_600_000 + m * 60_000 + s * 1_000),
                "{text}"
            );
        }
    }

    #[test]
    fn leading_zeros_and_whitespace() {
        assert_eq!(parse_time_spec(" 00:02:05 "), Ok(125_000));
        assert_eq!(parse_time_spec("007"), Ok(7_000));
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(parse_time_spec(""), Err(ParseError::Empty));
        assert_eq!(parse_time_spec("   "), Err(ParseError::Empty));
    }

    #[test]
    fn four_parts_are_rejected() {
        assert_eq!(parse_time_spec("1:2:3:4"), Err(ParseError::TooManyParts { parts: 4 }));
    }

    #[test]
    fn non_numeric_components_are_rejected() {
        for bad in ["abc", "1:x", "1::2", ":30", "1:30:", "+5", "-5", "1.5", "1:02.5", "１２"] {
            assert!(
                matches!(parse_time_spec(bad), Err(ParseError::NotANumber { .. })),
                "{bad:?} should be NotANumber"
            );
        }
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(parse_time_spec("99999999999999999999"), Err(ParseError::Overflow));
        assert_eq!(parse_time_spec("18446744073709551:0:0"), Err(ParseError::Overflow));
    }

    #[test]
    fn millis_readout() {
        assert_eq!(format_hms_millis(0), "00:00:00.000");
        assert_eq!(format_hms_millis(3_723_456), "01:02:03.456");
        assert_eq!(format_hms(360_000_000), "100:00:00");
    }
}
