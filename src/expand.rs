//! Defines [`Expander`], the macro-expansion engine. Expansion runs four
//! passes in fixed order, each over the entire output of the previous pass:
//!
//! 1. Include resolution (`{%inc|name%}`), repeated to a textual fixpoint so
//!    included templates may themselves include templates.
//! 2. Index generation (`{%index|category(limit)|pattern%}`), so per-item
//!    patterns are fully expanded before the later passes run.
//! 3. Reference resolution (`{#slug}`), so a tag filter never sees an
//!    unresolved reference token.
//! 4. Tag substitution (`{key}` / `{key|filter}`).

use crate::catalog::Catalog;
use crate::filter::FilterRegistry;
use crate::logger;
use crate::meta::MetaDict;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{%inc\|([^%]+)%\}").unwrap());

static INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%index\|([A-Za-z0-9_-]+)(?:\((\d+)\))?\|([^%]+)%\}").unwrap()
});

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{#([^}]+)\}").unwrap());

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_.-]+)(?:\|([^}]+))?\}").unwrap());

/// There is no cycle detection for template includes; the fixpoint iteration
/// is capped instead, and whatever markers survive the cap are dropped with a
/// warning.
const MAX_INCLUDE_PASSES: usize = 32;

/// The seam through which the engine loads templates by name. `None` means
/// the template doesn't exist; the engine substitutes the empty string.
pub trait TemplateSource {
    fn load(&self, name: &str) -> Option<String>;
}

/// Performs the ordered macro-expansion passes over a text given a metadata
/// context. Holds read-only references to its collaborators; one `Expander`
/// can expand any number of texts.
pub struct Expander<'a> {
    pub catalog: &'a Catalog,
    pub templates: &'a dyn TemplateSource,
    pub filters: &'a FilterRegistry,
    /// Site-level metadata, consulted by filters (`dateFormat`).
    pub site: &'a MetaDict,
}

impl Expander<'_> {
    /// Expands `text` against `meta` and returns the final text. Per-marker
    /// failures (missing template, unknown slug, unknown key) degrade to the
    /// empty string; expansion itself never fails.
    pub fn expand(&self, text: &str, meta: &MetaDict) -> String {
        let text = self.resolve_includes(text);

        let text = INDEX.replace_all(&text, |caps: &Captures| {
            let limit = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            self.generate_index(&caps[1], limit, &caps[3], meta)
        });

        let text = REFERENCE.replace_all(&text, |caps: &Captures| {
            match self.catalog.by_slug(&caps[1]) {
                Some(file) => file.url().unwrap_or_default(),
                None => {
                    logger::warn(&format!("no document with slug '{}'", &caps[1]));
                    String::new()
                }
            }
        });

        TAG.replace_all(&text, |caps: &Captures| {
            let value = meta.get(&caps[1]);
            match caps.get(2) {
                Some(filter) => self.filters.apply(filter.as_str(), &value, self.site),
                None => value,
            }
        })
        .into_owned()
    }

    /// Replaces `{%inc|name%}` markers with template contents until none
    /// remain, up to [`MAX_INCLUDE_PASSES`] passes.
    fn resolve_includes(&self, text: &str) -> String {
        let mut text = text.to_owned();
        for _ in 0..MAX_INCLUDE_PASSES {
            if !INCLUDE.is_match(&text) {
                return text;
            }
            text = INCLUDE
                .replace_all(&text, |caps: &Captures| {
                    self.templates.load(&caps[1]).unwrap_or_default()
                })
                .into_owned();
        }
        if INCLUDE.is_match(&text) {
            logger::warn("include expansion did not converge; dropping remaining markers");
            text = INCLUDE.replace_all(&text, "").into_owned();
        }
        text
    }

    /// Expands `pattern` once per document in `category` (date-descending,
    /// truncated to `limit` when nonzero) and concatenates the results. Each
    /// per-document expansion sees the document's own metadata directly and
    /// the including page's metadata under the `page.` prefix.
    fn generate_index(&self, category: &str, limit: usize, pattern: &str, meta: &MetaDict) -> String {
        let mut files = self.catalog.in_category(category);
        if limit > 0 {
            files.truncate(limit);
        }
        let mut out = String::new();
        for file in files {
            if let Some(file_meta) = file.meta() {
                let mut context = file_meta.clone();
                context.merge(meta, "page.");
                out.push_str(&self.expand(pattern, &context));
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;
    use url::Url;

    impl TemplateSource for HashMap<&str, &str> {
        fn load(&self, name: &str) -> Option<String> {
            self.get(name).map(|s| (*s).to_owned())
        }
    }

    fn write_file(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    struct Fixture {
        catalog: Catalog,
        templates: HashMap<&'static str, &'static str>,
        filters: FilterRegistry,
        site: MetaDict,
    }

    impl Fixture {
        fn empty() -> Fixture {
            Fixture {
                catalog: Catalog::new(),
                templates: HashMap::new(),
                filters: FilterRegistry::new(),
                site: MetaDict::new(),
            }
        }

        fn with_blog(root: &TempDir) -> Fixture {
            for (name, date) in [
                ("hello-world", "20230101"),
                ("second", "20230102"),
                ("third", "20230103"),
            ] {
                write_file(
                    root.path(),
                    &format!("{}-{}.md", date, name),
                    &format!("---\ncategory = blog\ntitle = {}\n---\nbody\n", name),
                );
            }
            let base = Url::parse("https://example.org/").unwrap();
            Fixture {
                catalog: Catalog::scan(root.path(), &base, &MetaDict::new()).unwrap(),
                ..Fixture::empty()
            }
        }

        fn expander(&self) -> Expander {
            Expander {
                catalog: &self.catalog,
                templates: &self.templates,
                filters: &self.filters,
                site: &self.site,
            }
        }
    }

    #[test]
    fn test_tag_substitution() {
        let fixture = Fixture::empty();
        let mut meta = MetaDict::new();
        meta.set("title", "Hello");
        assert_eq!(
            fixture.expander().expand("<h1>{title}</h1>", &meta),
            "<h1>Hello</h1>"
        );
    }

    #[test]
    fn test_unknown_tag_substitutes_empty() {
        let fixture = Fixture::empty();
        assert_eq!(
            fixture.expander().expand("[{missing}]", &MetaDict::new()),
            "[]"
        );
    }

    #[test]
    fn test_tag_with_filter() {
        let fixture = Fixture::empty();
        let mut meta = MetaDict::new();
        meta.set("title", "shout");
        meta.set("date", "20230101");
        let expander = fixture.expander();
        assert_eq!(expander.expand("{title|upper}", &meta), "SHOUT");
        assert_eq!(expander.expand("{date|yyyy}", &meta), "2023");
    }

    #[test]
    fn test_include_nested_two_levels() {
        let mut fixture = Fixture::empty();
        fixture.templates.insert("a", "A[{%inc|b%}]");
        fixture.templates.insert("b", "literal");
        assert_eq!(
            fixture.expander().expand("{%inc|a%}", &MetaDict::new()),
            "A[literal]"
        );
    }

    #[test]
    fn test_missing_include_substitutes_empty() {
        let fixture = Fixture::empty();
        assert_eq!(
            fixture.expander().expand("x{%inc|gone%}y", &MetaDict::new()),
            "xy"
        );
    }

    #[test]
    fn test_self_including_template_terminates() {
        let mut fixture = Fixture::empty();
        fixture.templates.insert("loop", "{%inc|loop%}");
        assert_eq!(
            fixture.expander().expand("{%inc|loop%}", &MetaDict::new()),
            ""
        );
    }

    #[test]
    fn test_included_text_is_expanded_by_later_passes() {
        let mut fixture = Fixture::empty();
        fixture.templates.insert("header", "<title>{title}</title>");
        let mut meta = MetaDict::new();
        meta.set("title", "Home");
        assert_eq!(
            fixture.expander().expand("{%inc|header%}", &meta),
            "<title>Home</title>"
        );
    }

    #[test]
    fn test_index_limit_and_ordering() {
        let root = TempDir::new().unwrap();
        let fixture = Fixture::with_blog(&root);
        assert_eq!(
            fixture
                .expander()
                .expand("{%index|blog(2)|{title}\n%}", &MetaDict::new()),
            "third\nsecond\n"
        );
    }

    #[test]
    fn test_index_unlimited_when_no_limit_given() {
        let root = TempDir::new().unwrap();
        let fixture = Fixture::with_blog(&root);
        assert_eq!(
            fixture
                .expander()
                .expand("{%index|blog|{title};%}", &MetaDict::new()),
            "third;second;hello-world;"
        );
    }

    #[test]
    fn test_index_pattern_sees_page_context() {
        let root = TempDir::new().unwrap();
        let fixture = Fixture::with_blog(&root);
        let mut page = MetaDict::new();
        page.set("title", "Index Page");
        assert_eq!(
            fixture
                .expander()
                .expand("{%index|blog(1)|{title} on {page.title}%}", &page),
            "third on Index Page"
        );
    }

    #[test]
    fn test_index_of_empty_category_is_empty() {
        let root = TempDir::new().unwrap();
        let fixture = Fixture::with_blog(&root);
        assert_eq!(
            fixture
                .expander()
                .expand("{%index|nothing|{title}%}", &MetaDict::new()),
            ""
        );
    }

    #[test]
    fn test_reference_resolution() {
        let root = TempDir::new().unwrap();
        let fixture = Fixture::with_blog(&root);
        assert_eq!(
            fixture
                .expander()
                .expand("see {#hello-world}", &MetaDict::new()),
            "see https://example.org/hello-world.html"
        );
    }

    #[test]
    fn test_unknown_reference_substitutes_empty() {
        let fixture = Fixture::empty();
        assert_eq!(
            fixture.expander().expand("see {#nowhere}!", &MetaDict::new()),
            "see !"
        );
    }
}
