//! Locale-aware numeric normalization for the scraped cells.
//!
//! Fundamentus publishes Brazilian-formatted numbers (`1.234,56`, `12,5%`).
//! Cells stay verbatim strings everywhere else; this is the single place
//! that turns one into a number.

/// Converts a locale-formatted cell to a canonical f64.
///
/// Placeholder tokens (``""``, ``"-"``, ``"N/A"``) and anything unparsable
/// yield `None`; screening predicates treat that as a failed predicate.
pub fn clean_numeric(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    s = s.strip_suffix('%').unwrap_or(s).trim_end();

    if s.is_empty() || s == "-" || s.eq_ignore_ascii_case("N/A") {
        return None;
    }

    // BR format disambiguation: "1.234,56" has thousands dots and a decimal
    // comma; "4,50" has only the decimal comma. Otherwise parse as-is.
    let normalized = if s.contains('.') && s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else if s.contains(',') {
        s.replace(',', ".")
    } else {
        s.to_string()
    };

    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_brazilian_thousands_and_decimal() {
        assert_eq!(clean_numeric("1.234,56"), Some(1234.56));
        assert_eq!(clean_numeric("1.234.567,89"), Some(1234567.89));
    }

    #[test]
    fn parses_decimal_comma_only() {
        assert_eq!(clean_numeric("4,50"), Some(4.5));
        assert_eq!(clean_numeric("-3,2"), Some(-3.2));
    }

    #[test]
    fn parses_plain_numbers() {
        assert_eq!(clean_numeric("1000000"), Some(1_000_000.0));
        assert_eq!(clean_numeric("12.5"), Some(12.5));
    }

    #[test]
    fn strips_percent_suffix() {
        assert_eq!(clean_numeric("12,50%"), Some(12.5));
        assert_eq!(clean_numeric("7%"), Some(7.0));
    }

    #[test]
    fn placeholders_yield_none() {
        assert_eq!(clean_numeric(""), None);
        assert_eq!(clean_numeric("-"), None);
        assert_eq!(clean_numeric("N/A"), None);
        assert_eq!(clean_numeric("  "), None);
    }

    #[test]
    fn garbage_yields_none() {
        assert_eq!(clean_numeric("abc"), None);
        assert_eq!(clean_numeric("12,3,4"), None);
    }
}
