//! Defines [`FilterRegistry`], the named string transforms applied by the
//! tag-substitution pass (`{key|filter}`), plus the date parsing and
//! formatting helpers they share. Dates are accepted in any of the formats
//! `yyyyMMdd`, `yyyy-MM-dd`, `yyyy.MM.dd`, `yyyy/MM/dd`, and
//! `yyyyMMddhhmmss`; output patterns use the same `yyyy`/`MM`/`dd` token
//! language (the site's `dateFormat` key and unknown filter names are both
//! interpreted this way).

use crate::meta::MetaDict;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A filter takes the site metadata (for configuration such as `dateFormat`)
/// and the input value, and returns the transformed value.
type FilterFn = fn(&MetaDict, &str) -> String;

/// A case-insensitive mapping from filter name to transform. Lookup misses
/// fall back to interpreting the name as a date pattern; a value that isn't a
/// date passes through unchanged, so a bad filter name never loses data.
pub struct FilterRegistry {
    filters: Vec<(&'static str, FilterFn)>,
}

impl FilterRegistry {
    /// Creates a registry with the built-in filters: `upper`, `lower`,
    /// `date` (reformats using the site `dateFormat`, default `yyyyMMdd`),
    /// and `rfc822`.
    pub fn new() -> FilterRegistry {
        FilterRegistry {
            filters: vec![
                ("upper", |_, s| s.to_uppercase()),
                ("lower", |_, s| s.to_lowercase()),
                ("date", |site, s| match try_parse_date(s) {
                    Some(dt) => format_date(&dt, &site.get_or("dateFormat", "yyyyMMdd")),
                    None => s.to_owned(),
                }),
                ("rfc822", |_, s| match try_parse_date(s) {
                    Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
                    None => s.to_owned(),
                }),
            ],
        }
    }

    /// Applies the filter named `name` to `value`. Unknown names are tried as
    /// literal date patterns; if `value` doesn't parse as a date either, the
    /// raw value is returned.
    pub fn apply(&self, name: &str, value: &str, site: &MetaDict) -> String {
        match self
            .filters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, f)) => f(site, value),
            None => match try_parse_date(value) {
                Some(dt) => format_date(&dt, name),
                None => value.to_owned(),
            },
        }
    }
}

impl Default for FilterRegistry {
    fn default() -> FilterRegistry {
        FilterRegistry::new()
    }
}

/// Date-only input formats, tried in order after the full timestamp form.
const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d"];

/// Parses `value` against the accepted input formats. Date-only inputs get a
/// midnight time so every parsed value carries the same precision.
pub fn try_parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S") {
        return Some(dt);
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(NaiveDateTime::new(date, NaiveTime::MIN));
        }
    }
    None
}

/// Formats `dt` with a `yyyy`/`MM`/`dd`-style pattern by translating it to
/// the equivalent strftime string.
pub fn format_date(dt: &NaiveDateTime, pattern: &str) -> String {
    dt.format(&strftime(pattern)).to_string()
}

/// Translates a date pattern into chrono's strftime language. Recognized
/// token runs: `y` (year), `M` (month; 3 = abbreviated name, 4+ = full name),
/// `d` (day; 3 = abbreviated weekday, 4+ = full weekday), `h`/`H` (hour),
/// `m` (minute), `s` (second). Everything else is copied through literally,
/// with `%` escaped so chrono never sees a stray specifier.
fn strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        match c {
            'y' => out.push_str(if run >= 4 { "%Y" } else { "%y" }),
            'M' => out.push_str(match run {
                4.. => "%B",
                3 => "%b",
                _ => "%m",
            }),
            'd' => out.push_str(match run {
                4.. => "%A",
                3 => "%a",
                _ => "%d",
            }),
            'h' | 'H' => out.push_str("%H"),
            'm' => out.push_str("%M"),
            's' => out.push_str("%S"),
            '%' => (0..run).for_each(|_| out.push_str("%%")),
            _ => (0..run).for_each(|_| out.push(c)),
        }
        i += run;
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn registry() -> (FilterRegistry, MetaDict) {
        (FilterRegistry::new(), MetaDict::new())
    }

    #[test]
    fn test_upper_lower() {
        let (filters, site) = registry();
        assert_eq!(filters.apply("upper", "hello", &site), "HELLO");
        assert_eq!(filters.apply("LOWER", "Hello", &site), "hello");
    }

    #[test]
    fn test_date_uses_site_date_format() {
        let (filters, mut site) = registry();
        site.set("dateFormat", "yyyy-MM-dd");
        assert_eq!(filters.apply("date", "20230101", &site), "2023-01-01");
    }

    #[test]
    fn test_date_default_format() {
        let (filters, site) = registry();
        assert_eq!(filters.apply("date", "2023-01-01", &site), "20230101");
    }

    #[test]
    fn test_date_passes_non_dates_through() {
        let (filters, site) = registry();
        assert_eq!(filters.apply("date", "not a date", &site), "not a date");
    }

    #[test]
    fn test_rfc822() {
        let (filters, site) = registry();
        assert_eq!(
            filters.apply("rfc822", "20230101", &site),
            "Sun, 01 Jan 2023 00:00:00 GMT"
        );
    }

    #[test]
    fn test_unknown_filter_as_date_pattern() {
        let (filters, site) = registry();
        assert_eq!(filters.apply("yyyy", "20230101", &site), "2023");
        assert_eq!(filters.apply("dd/MM/yyyy", "20230101", &site), "01/01/2023");
        assert_eq!(filters.apply("MMM yyyy", "20230101", &site), "Jan 2023");
    }

    #[test]
    fn test_unknown_filter_on_non_date_is_ignored() {
        let (filters, site) = registry();
        assert_eq!(filters.apply("bogus", "hello", &site), "hello");
    }

    #[test]
    fn test_try_parse_date_accepted_formats() {
        for value in ["20230102", "2023-01-02", "2023.01.02", "2023/01/02"] {
            let dt = try_parse_date(value).unwrap();
            assert_eq!(format_date(&dt, "yyyyMMdd"), "20230102", "{}", value);
        }
        let dt = try_parse_date("20230102030405").unwrap();
        assert_eq!(format_date(&dt, "yyyyMMdd hh:mm:ss"), "20230102 03:04:05");
        assert_eq!(try_parse_date("01-02-2023"), None);
        assert_eq!(try_parse_date(""), None);
    }

    #[test]
    fn test_strftime_translation() {
        assert_eq!(strftime("yyyy-MM-dd"), "%Y-%m-%d");
        assert_eq!(strftime("yyyyMMddhhmmss"), "%Y%m%d%H%M%S");
        assert_eq!(strftime("dd MMMM yyyy"), "%d %B %Y");
        // A literal percent never leaks into chrono as a specifier.
        assert_eq!(strftime("100%"), "100%%");
    }
}
