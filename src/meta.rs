//! Defines [`MetaDict`], the metadata store shared by the site configuration,
//! content files, and macro expansion. A `MetaDict` maps ASCII-case-insensitive
//! keys to value slots which are either literal strings or computed values
//! (re-evaluated on every read, so `sys.date` always yields the current
//! timestamp). Reading a key performs exactly one level of `$key`
//! interpolation: each `$identifier` embedded in the resolved value is
//! replaced by the slot-resolved value of that identifier in the same dict,
//! and any `$ref` inside *that* value is emitted verbatim.

use regex::{Captures, Regex};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Matches a `key = value` metadata line. Shared by frontmatter parsing and
/// `site.ini` loading.
static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z0-9_-]+)\s*=\s*(.+)$").unwrap());

/// Matches a `$identifier` self-reference embedded in a value.
static META_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z0-9_.-]+)").unwrap());

/// A single value slot: either a literal string or a deferred computation.
/// Computed slots are invoked fresh on every read and never cached.
#[derive(Clone)]
enum Slot {
    Literal(String),
    Computed(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Slot {
    fn resolve(&self) -> String {
        match self {
            Slot::Literal(s) => s.clone(),
            Slot::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Slot::Literal(s) => write!(f, "Literal({:?})", s),
            Slot::Computed(_) => write!(f, "Computed(..)"),
        }
    }
}

/// An ordered, ASCII-case-insensitive key/value store. Keys retain their
/// originally-written case for iteration; lookups and overwrites compare
/// case-insensitively. Cloning takes a snapshot, not a live view.
#[derive(Clone, Debug)]
pub struct MetaDict {
    entries: Vec<(String, Slot)>,
}

impl MetaDict {
    /// Creates a dict containing only the built-in `sys.date` computed slot.
    pub fn new() -> MetaDict {
        let mut dict = MetaDict {
            entries: Vec::new(),
        };
        dict.entries.push((
            "sys.date".to_owned(),
            Slot::Computed(Arc::new(|| {
                chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
            })),
        ));
        dict
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    /// Resolves a key's slot without `$ref` interpolation.
    fn raw(&self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.entries[i].1.resolve())
    }

    /// Returns the value for `key`, or the empty string when absent. The
    /// resolved value has each embedded `$identifier` substituted once; see
    /// the module docs for the one-level contract.
    pub fn get(&self, key: &str) -> String {
        self.get_or(key, "")
    }

    /// Returns the value for `key`, or `default` when absent. Missing keys
    /// are never an error.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        match self.raw(key) {
            None => default.to_owned(),
            Some(value) => META_REF
                .replace_all(&value, |caps: &Captures| {
                    self.raw(&caps[1]).unwrap_or_default()
                })
                .into_owned(),
        }
    }

    /// Stores `value` as a literal under `key`, overwriting any existing
    /// entry. An overwrite keeps the originally-written key case.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let slot = Slot::Literal(value.into());
        match self.position(&key) {
            Some(i) => self.entries[i].1 = slot,
            None => self.entries.push((key, slot)),
        }
    }

    fn set_slot(&mut self, key: String, slot: Slot) {
        match self.position(&key) {
            Some(i) => self.entries[i].1 = slot,
            None => self.entries.push((key, slot)),
        }
    }

    /// Returns whether `key` has an entry.
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Copies every entry of `other` into `self`, prefixing each key with
    /// `prefix`. Later merges overwrite same-named keys (last write wins).
    /// Computed slots are shared, not re-evaluated at merge time.
    pub fn merge(&mut self, other: &MetaDict, prefix: &str) {
        for (key, slot) in &other.entries {
            self.set_slot(format!("{}{}", prefix, key), slot.clone());
        }
    }

    /// Iterates keys in insertion order, with their originally-written case.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Default for MetaDict {
    fn default() -> MetaDict {
        MetaDict::new()
    }
}

impl FromIterator<(String, String)> for MetaDict {
    /// Builds a dict (including the built-ins) from plain key/value pairs.
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> MetaDict {
        let mut dict = MetaDict::new();
        for (key, value) in iter {
            dict.set(key, value);
        }
        dict
    }
}

/// Parses one `key = value` line. The key is `[A-Za-z0-9_-]+`; the value is
/// the rest of the line with one layer of matching surrounding single or
/// double quotes stripped. Returns `None` for lines that don't match, which
/// callers skip silently.
pub fn parse_key_value(line: &str) -> Option<(String, String)> {
    let caps = KEY_VALUE.captures(line)?;
    let key = caps[1].to_owned();
    let value = caps[2].trim();
    let value = if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    };
    Some((key, value.to_owned()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_set_literal() {
        let mut dict = MetaDict::new();
        dict.set("title", "Hello");
        assert_eq!(dict.get("title"), "Hello");
    }

    #[test]
    fn test_get_missing_returns_default() {
        let dict = MetaDict::new();
        assert_eq!(dict.get("nope"), "");
        assert_eq!(dict.get_or("nope", "fallback"), "fallback");
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut dict = MetaDict::new();
        dict.set("Title", "Hello");
        assert_eq!(dict.get("title"), "Hello");
        assert_eq!(dict.get("TITLE"), "Hello");
        dict.set("tItLe", "Bye");
        assert_eq!(dict.get("title"), "Bye");
        // The originally-written case survives overwrites.
        assert!(dict.keys().any(|k| k == "Title"));
    }

    #[test]
    fn test_ref_expands_one_level() {
        let mut dict = MetaDict::new();
        dict.set("a", "$b");
        dict.set("b", "hello");
        assert_eq!(dict.get("a"), "hello");
    }

    #[test]
    fn test_ref_chain_is_not_recursive() {
        let mut dict = MetaDict::new();
        dict.set("a", "$b");
        dict.set("b", "$c");
        dict.set("c", "hello");
        // One level of indirection only: the referenced value's own
        // reference is emitted verbatim.
        assert_eq!(dict.get("a"), "$c");
        assert_eq!(dict.get("b"), "hello");
    }

    #[test]
    fn test_ref_missing_key_expands_to_empty() {
        let mut dict = MetaDict::new();
        dict.set("a", "x$missing!y");
        assert_eq!(dict.get("a"), "x!y");
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut dict = MetaDict::new();
        let mut one = MetaDict::new();
        one.set("x", "1");
        let mut two = MetaDict::new();
        two.set("x", "2");
        dict.merge(&one, "");
        dict.merge(&two, "");
        assert_eq!(dict.get("x"), "2");
    }

    #[test]
    fn test_merge_prefix() {
        let mut site = MetaDict::new();
        site.set("title", "My Site");
        let mut page = MetaDict::new();
        page.merge(&site, "site.");
        assert_eq!(page.get("site.title"), "My Site");
        assert_eq!(page.get("title"), "");
    }

    #[test]
    fn test_clone_is_a_snapshot() {
        let mut dict = MetaDict::new();
        dict.set("k", "before");
        let copy = dict.clone();
        dict.set("k", "after");
        assert_eq!(copy.get("k"), "before");
        assert_eq!(dict.get("k"), "after");
    }

    #[test]
    fn test_sys_date_is_present_and_current() {
        let dict = MetaDict::new();
        let stamp = dict.get("sys.date");
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_computed_slot_is_evaluated_on_every_read() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let counter = Arc::new(AtomicUsize::new(0));
        let mut dict = MetaDict::new();
        let c = counter.clone();
        dict.set_slot(
            "n".to_owned(),
            Slot::Computed(Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst).to_string()
            })),
        );
        assert_eq!(dict.get("n"), "0");
        assert_eq!(dict.get("n"), "1");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("title = Hello"),
            Some(("title".to_owned(), "Hello".to_owned()))
        );
        assert_eq!(
            parse_key_value("  date=20230101  "),
            Some(("date".to_owned(), "20230101".to_owned()))
        );
    }

    #[test]
    fn test_parse_key_value_strips_matching_quotes() {
        assert_eq!(
            parse_key_value(r#"title = "Hello, world""#),
            Some(("title".to_owned(), "Hello, world".to_owned()))
        );
        assert_eq!(
            parse_key_value("slug = 'my-entry'"),
            Some(("slug".to_owned(), "my-entry".to_owned()))
        );
        // Mismatched quotes are kept as-is.
        assert_eq!(
            parse_key_value(r#"title = "oops'"#),
            Some(("title".to_owned(), "\"oops'".to_owned()))
        );
    }

    #[test]
    fn test_parse_key_value_rejects_malformed_lines() {
        assert_eq!(parse_key_value("no equals sign"), None);
        assert_eq!(parse_key_value("; comment = yes?"), None);
        assert_eq!(parse_key_value(""), None);
    }
}
