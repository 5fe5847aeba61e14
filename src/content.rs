//! Defines [`ContentFile`], one source file under the content root. Files are
//! classified by extension into content documents (parsed for frontmatter and
//! macro-expanded) and static assets (copied verbatim). For content files the
//! canonical identity — `slug`, `date`, `title`, `url` — is derived from
//! frontmatter when present and from the filename otherwise.

use crate::meta::{self, MetaDict};
use regex::Regex;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

/// Extensions recognized as page content; everything else is an asset.
const CONTENT_EXTENSIONS: &[&str] = &["html", "htm", "md", "xml"];

/// Matches a `<digits>-<rest>` file stem, the naming convention that encodes
/// a date and a slug into the filename.
static DATED_STEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)-(.+)$").unwrap());

/// The two classifications of a source file.
#[derive(Clone, Debug)]
pub enum Kind {
    /// A content document with parsed and derived metadata.
    Content { meta: MetaDict },
    /// A static asset, copied byte-for-byte.
    Asset,
}

/// One source file under the content root.
#[derive(Clone, Debug)]
pub struct ContentFile {
    path: PathBuf,
    rel: PathBuf,
    kind: Kind,
}

impl ContentFile {
    /// Loads and classifies the file at `path`. Content files are read and
    /// parsed immediately; an unreadable content file is an error (assets are
    /// not read here). `base_url` and `site_meta` come from the site
    /// configuration; `site_meta` is merged into the file's metadata under
    /// the `site.` prefix.
    pub fn load(
        path: &Path,
        content_root: &Path,
        base_url: &Url,
        site_meta: &MetaDict,
    ) -> Result<ContentFile> {
        let lossy = path.to_string_lossy();
        let path = PathBuf::from(
            lossy
                .trim_end_matches(std::path::MAIN_SEPARATOR)
                .to_owned(),
        );
        let rel = path
            .strip_prefix(content_root)
            .map_err(|_| Error::OutsideContentRoot(path.clone()))?
            .to_owned();

        if !is_content_path(&path) {
            return Ok(ContentFile {
                path,
                rel,
                kind: Kind::Asset,
            });
        }

        let text = fs::read_to_string(&path).map_err(|err| Error::Read {
            path: path.clone(),
            err,
        })?;

        let mut meta = MetaDict::new();
        parse_frontmatter(&text, &mut meta);
        derive_identity(&mut meta, &rel, base_url)?;
        meta.merge(site_meta, "site.");

        Ok(ContentFile {
            path,
            rel,
            kind: Kind::Content { meta },
        })
    }

    /// The absolute source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path relative to the content root.
    pub fn rel(&self) -> &Path {
        &self.rel
    }

    pub fn is_content(&self) -> bool {
        matches!(self.kind, Kind::Content { .. })
    }

    /// Whether this is a Markdown source (and so needs rendering on emit).
    pub fn is_markdown(&self) -> bool {
        extension_is(&self.path, "md")
    }

    /// The parsed metadata; `None` for assets.
    pub fn meta(&self) -> Option<&MetaDict> {
        match &self.kind {
            Kind::Content { meta } => Some(meta),
            Kind::Asset => None,
        }
    }

    /// The document slug; `None` for assets.
    pub fn slug(&self) -> Option<String> {
        self.meta().map(|m| m.get("slug"))
    }

    /// The document URL; `None` for assets.
    pub fn url(&self) -> Option<String> {
        self.meta().map(|m| m.get("url"))
    }

    /// Whether the document is marked `draft = "true"` (case-insensitive).
    /// Drafts are excluded from the catalog. Assets are never drafts.
    pub fn is_draft(&self) -> bool {
        self.meta()
            .map_or(false, |m| m.get("draft").eq_ignore_ascii_case("true"))
    }

    /// The output location under `output_root`, mirroring the source layout.
    /// Content documents are written as `<slug>.html`; assets keep their
    /// name.
    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        match &self.kind {
            Kind::Content { meta } => {
                let dir = match self.rel.parent() {
                    Some(parent) => output_root.join(parent),
                    None => output_root.to_owned(),
                };
                dir.join(format!("{}.html", meta.get("slug")))
            }
            Kind::Asset => output_root.join(&self.rel),
        }
    }
}

impl fmt::Display for ContentFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn extension_is(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(wanted))
}

fn is_content_path(path: &Path) -> bool {
    CONTENT_EXTENSIONS.iter().any(|c| extension_is(path, c))
}

fn split_line(s: &str) -> (&str, &str) {
    match s.find('\n') {
        Some(i) => (&s[..i], &s[i + 1..]),
        None => (s, ""),
    }
}

/// Parses the frontmatter block into `meta` and stores the body under
/// `content`. A file whose first line is not `---` has no metadata: the
/// entire text becomes `content`. Inside the block, lines that don't match
/// `key = value` are skipped silently; a missing closing fence consumes the
/// whole file as frontmatter, leaving an empty body.
fn parse_frontmatter(text: &str, meta: &mut MetaDict) {
    let (first, mut rest) = split_line(text);
    if first.trim() != "---" {
        meta.set("content", text);
        return;
    }

    let body = loop {
        if rest.is_empty() {
            break "";
        }
        let (line, tail) = split_line(rest);
        rest = tail;
        if line.trim() == "---" {
            break rest;
        }
        if let Some((key, value)) = meta::parse_key_value(line) {
            meta.set(key, value);
        }
    };
    meta.set("content", body);
}

/// Fills in missing `slug`/`date` from the filename, defaults `title` to the
/// slug, and derives `url` from the site base URL and the relative path with
/// the basename replaced by `<slug>.html`.
fn derive_identity(meta: &mut MetaDict, rel: &Path, base_url: &Url) -> Result<()> {
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if meta.get("slug").is_empty() || meta.get("date").is_empty() {
        match DATED_STEM.captures(&stem) {
            Some(caps) => {
                if meta.get("date").is_empty() {
                    meta.set("date", &caps[1]);
                }
                if meta.get("slug").is_empty() {
                    meta.set("slug", slug::slugify(&caps[2]));
                }
            }
            None => {
                if meta.get("slug").is_empty() {
                    meta.set("slug", slug::slugify(&stem));
                }
            }
        }
    }

    let title = meta.get_or("title", &meta.get("slug"));
    meta.set("title", title);

    let slug = meta.get("slug");
    let mut rel_url = String::new();
    if let Some(parent) = rel.parent() {
        for component in parent.components() {
            rel_url.push_str(&component.as_os_str().to_string_lossy());
            rel_url.push('/');
        }
    }
    rel_url.push_str(&slug);
    rel_url.push_str(".html");
    meta.set("url", base_url.join(&rel_url)?.to_string());

    Ok(())
}

/// The result of loading a [`ContentFile`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a [`ContentFile`].
#[derive(Debug)]
pub enum Error {
    /// Returned when a content file can't be read. Fatal for that file.
    Read { path: PathBuf, err: io::Error },

    /// Returned when the file is not under the content root.
    OutsideContentRoot(PathBuf),

    /// Returned when the derived URL can't be joined onto the site base URL.
    Url(url::ParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "reading '{}': {}", path.display(), err)
            }
            Error::OutsideContentRoot(path) => {
                write!(f, "'{}' is not under the content root", path.display())
            }
            Error::Url(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { path: _, err } => Some(err),
            Error::OutsideContentRoot(_) => None,
            Error::Url(err) => Some(err),
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. This allows us to
    /// use the `?` operator when joining URLs.
    fn from(err: url::ParseError) -> Error {
        Error::Url(err)
    }
}
