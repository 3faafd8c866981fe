//! Small numeric helpers shared by the catalogue and protocol layers: the
//! `limits` string on a descriptor is free text (spec §3: "a string
//! describing range/enumeration constraints; empty means unconstrained"),
//! and graph/delta payloads need a stable textual form for diagnostics.

/// Parses a `"min..max"` numeric range out of a descriptor's `limits`
/// string. Returns `None` for anything else, including the empty
/// (unconstrained) string.
#[inline]
pub fn parse_numeric_range(limits: &str) -> Option<(f64, f64)> {
    let (min_str, max_str) = limits.split_once("..")?;
    let min = min_str.trim().parse::<f64>().ok()?;
    let max = max_str.trim().parse::<f64>().ok()?;
    if min > max {
        return None;
    }
    Some((min, max))
}

/// Formats a sample value for diagnostic/client display, matching the
/// fixed two-decimal convention operators expect from the old UI.
#[inline]
pub fn format_sample(v: f32) -> String {
    format!("{v:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_range() {
        assert_eq!(parse_numeric_range("0..100"), Some((0.0, 100.0)));
        assert_eq!(parse_numeric_range(" -10.5 .. 10.5 "), Some((-10.5, 10.5)));
    }

    #[test]
    fn rejects_inverted_or_malformed_ranges() {
        assert_eq!(parse_numeric_range("100..0"), None);
        assert_eq!(parse_numeric_range("not a range"), None);
        assert_eq!(parse_numeric_range(""), None);
    }

    #[test]
    fn formats_to_two_decimal_places() {
        assert_eq!(format_sample(3.14159), "3.14");
        assert_eq!(format_sample(-0.5), "-0.50");
    }
}
