//! Fragment classifiers
//!
//! A fragment is kept when any classifier matches. The patterns are
//! English-only (month abbreviations, "D, YYYY"); widening the locale
//! scope means extending this table and nothing else.

use once_cell::sync::Lazy;
use regex::Regex;

/// Number followed by "view"/"views", e.g. "1,024,155 views".
pub static VIEW_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+[,\s]*views?").expect("view-count pattern"));

/// Month-name abbreviation, e.g. "Nov 21, 2025" or "premiered Dec 2".
pub static MONTH_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)").expect("month pattern")
});

/// Relative date: number plus time unit, optional "ago".
pub static RELATIVE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+\s*(hours?|days?|weeks?|months?|years?)(\s+ago)?\b")
        .expect("relative-date pattern")
});

/// Day-of-month/year tail, e.g. "21, 2025".
pub static DAY_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([1-9]|[12][0-9]|3[01]),\s*\d{4}\b").expect("day-year pattern"));

/// Fragment boundary: runs of 2+ spaces, newlines or tabs.
pub static FRAGMENT_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}|[\n\t]").expect("fragment-split pattern"));

/// Whitespace-run collapser.
pub static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Whether a trimmed fragment carries view-count or date content.
pub fn is_views_or_date(fragment: &str) -> bool {
    VIEW_COUNT.is_match(fragment)
        || MONTH_NAME.is_match(fragment)
        || RELATIVE_DATE.is_match(fragment)
        || DAY_YEAR.is_match(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_counts() {
        assert!(is_views_or_date("1,024,155 views"));
        assert!(is_views_or_date("1 view"));
        assert!(!is_views_or_date("views")); // no number
    }

    #[test]
    fn absolute_dates() {
        assert!(is_views_or_date("Nov 21, 2025"));
        assert!(is_views_or_date("Premiered Dec 2, 2024"));
        assert!(!is_views_or_date("#shorts"));
    }

    #[test]
    fn relative_dates() {
        assert!(is_views_or_date("3 hours ago"));
        assert!(is_views_or_date("2 weeks"));
        assert!(!is_views_or_date("ago"));
    }

    #[test]
    fn unrelated_text_is_rejected() {
        assert!(!is_views_or_date("Members first"));
        assert!(!is_views_or_date("Products"));
    }
}
