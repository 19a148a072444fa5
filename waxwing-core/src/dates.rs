//! Partial-precision dates as MusicBrainz reports them.
//!
//! Dates arrive as "YYYY", "YYYY-MM", or "YYYY-MM-DD". The raw string is
//! preserved verbatim; a normalized `NaiveDate` (start-of-period fill) is
//! derived for range queries and display. Refinement between two raw strings
//! is a prefix relation, not a date comparison.

use chrono::NaiveDate;

/// Normalize a raw partial date to its start-of-period `NaiveDate`.
/// Returns `None` for empty or malformed input.
pub fn normalize(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut parts = raw.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 1,
    };
    let day: u32 = match parts.next() {
        Some(d) => d.parse().ok()?,
        None => 1,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Whether one raw date string is a prefix of the other (either direction).
/// Empty/absent values are compatible with everything.
pub fn compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (non_empty(a), non_empty(b)) {
        (Some(a), Some(b)) => a.starts_with(b) || b.starts_with(a),
        _ => true,
    }
}

/// Whether `candidate` strictly refines `existing`: it extends the stored
/// string with more precision. A value refines an absent one.
pub fn refines(candidate: Option<&str>, existing: Option<&str>) -> bool {
    match (non_empty(candidate), non_empty(existing)) {
        (Some(c), Some(e)) => c.starts_with(e) && c.len() > e.len(),
        (Some(_), None) => true,
        _ => false,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_all_three_precisions() {
        assert_eq!(normalize("1969"), NaiveDate::from_ymd_opt(1969, 1, 1));
        assert_eq!(normalize("1969-09"), NaiveDate::from_ymd_opt(1969, 9, 1));
        assert_eq!(
            normalize("1969-09-26"),
            NaiveDate::from_ymd_opt(1969, 9, 26)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("abbey road"), None);
        assert_eq!(normalize("1969-13"), None);
    }

    #[test]
    fn prefix_compatibility_is_symmetric() {
        assert!(compatible(Some("2001"), Some("2001-06-15")));
        assert!(compatible(Some("2001-06-15"), Some("2001")));
        assert!(compatible(None, Some("2001")));
        assert!(compatible(Some(""), Some("2001")));
        assert!(!compatible(Some("2001"), Some("2002")));
    }

    #[test]
    fn refinement_requires_strictly_longer_prefix() {
        assert!(refines(Some("2001-06-15"), Some("2001")));
        assert!(refines(Some("2001-06"), None));
        assert!(!refines(Some("2001"), Some("2001")));
        assert!(!refines(Some("2001"), Some("2001-06")));
        assert!(!refines(None, Some("2001")));
        assert!(!refines(Some("2002-01"), Some("2001")));
    }
}
