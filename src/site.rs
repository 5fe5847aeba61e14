//! Defines [`Site`], which ties the pieces together: it loads `site.ini`,
//! owns the site-level [`MetaDict`] and the scanned [`Catalog`], loads
//! templates for the expansion engine, and emits every cataloged file into
//! the output tree. Setup problems (missing configuration, an invalid base
//! URL, an unreadable content file) are fatal; anything that goes wrong while
//! emitting a single file is logged and the build moves on.

use crate::catalog::{self, Catalog};
use crate::content::{self, ContentFile};
use crate::expand::{Expander, TemplateSource};
use crate::filter::FilterRegistry;
use crate::logger;
use crate::markdown;
use crate::meta::{self, MetaDict};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// The root configuration file. A directory containing one is a site.
pub const CONFIG_FILE: &str = "site.ini";

/// One site: root paths, configuration metadata, and the content catalog.
pub struct Site {
    root: PathBuf,
    content_dir: PathBuf,
    templates_dir: PathBuf,
    output_dir: PathBuf,
    meta: MetaDict,
    base_url: Url,
    filters: FilterRegistry,
    catalog: Catalog,
}

fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_owned())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

impl Site {
    /// Loads the site rooted at `root`. `site.ini` must exist; its
    /// `key = value` lines become the site metadata. When `local` is set the
    /// configured `url` is overridden with a `file://` URL pointing at the
    /// output directory. The effective `url` is suffixed with `/` when
    /// missing and must parse as an absolute URL.
    pub fn load(root: &Path, local: bool) -> Result<Site> {
        let root = absolutize(root)?;
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(Error::MissingConfig(config_path));
        }

        let mut site_meta = MetaDict::new();
        for line in fs::read_to_string(&config_path)?.lines() {
            if let Some((key, value)) = meta::parse_key_value(line) {
                site_meta.set(key, value);
            }
        }

        let content_dir = root.join("content");
        let templates_dir = root.join("templates");
        let output_dir = root.join("output");

        if local {
            let url = Url::from_directory_path(&output_dir)
                .map_err(|_| Error::InvalidBaseUrl(output_dir.display().to_string()))?;
            site_meta.set("url", url.to_string());
        }

        let mut url = site_meta.get("url");
        if !url.ends_with('/') {
            url.push('/');
            site_meta.set("url", url.clone());
        }
        let base_url = Url::parse(&url).map_err(|_| Error::InvalidBaseUrl(url))?;

        Ok(Site {
            root,
            content_dir,
            templates_dir,
            output_dir,
            meta: site_meta,
            base_url,
            filters: FilterRegistry::new(),
            catalog: Catalog::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn meta(&self) -> &MetaDict {
        &self.meta
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Builds the catalog by scanning the content directory. Must run before
    /// [`Site::emit`]; emission itself never mutates the catalog.
    pub fn scan(&mut self) -> Result<()> {
        self.catalog = Catalog::scan(&self.content_dir, &self.base_url, &self.meta)?;
        Ok(())
    }

    /// Deletes the previous output tree and emits every cataloged file.
    /// Per-file failures are logged and skipped. Returns the number of files
    /// written.
    pub fn emit(&self) -> usize {
        if !self.content_dir.exists() {
            logger::warn("no content directory found, nothing to do");
            return 0;
        }

        if self.output_dir.exists() {
            logger::info("deleting previous output directory");
            if let Err(err) = fs::remove_dir_all(&self.output_dir) {
                logger::warn(&format!(
                    "could not delete '{}': {}",
                    self.output_dir.display(),
                    err
                ));
            }
        }

        let mut emitted = 0;
        for file in self.catalog.iter() {
            match self.emit_file(file) {
                Ok(()) => emitted += 1,
                Err(err) => logger::error(&format!("emitting '{}': {}", file, err)),
            }
        }
        emitted
    }

    /// Emits one file: assets are byte-copied; content documents get their
    /// body expanded, Markdown-rendered when the source is `.md`, wrapped in
    /// their `template` when one is set (the wrapped text is expanded again),
    /// and written to the derived output path.
    pub fn emit_file(&self, file: &ContentFile) -> Result<()> {
        logger::info(&format!("emitting {}", file));
        let output = file.output_path(&self.output_dir);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        let meta = match file.meta() {
            None => {
                if output.exists() {
                    fs::remove_file(&output)?;
                }
                fs::copy(file.path(), &output)?;
                return Ok(());
            }
            Some(meta) => meta,
        };

        let mut working = meta.clone();
        let expander = Expander {
            catalog: &self.catalog,
            templates: self,
            filters: &self.filters,
            site: &self.meta,
        };

        let mut body = expander.expand(&working.get("content"), &working);
        if file.is_markdown() {
            body = markdown::render(&body);
        }
        working.set("content", body);

        let template_name = working.get("template");
        if !template_name.is_empty() {
            if let Some(template) = self.load(&template_name) {
                let wrapped = expander.expand(&template, &working);
                working.set("content", wrapped);
            }
        }

        fs::write(&output, working.get("content"))?;
        Ok(())
    }

    /// Watch-mode entry point: re-parses `path` and re-emits it. A deleted
    /// path or one re-parsed into a draft is removed from the catalog; the
    /// catalog replace is an explicit upsert by path.
    pub fn refresh(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            if self.catalog.remove(path) {
                logger::info(&format!("removed {}", path.display()));
            }
            return Ok(());
        }
        if !path.is_file() {
            return Ok(());
        }

        let file = ContentFile::load(path, &self.content_dir, &self.base_url, &self.meta)
            .map_err(Error::File)?;
        if !self.catalog.upsert(file) {
            logger::info(&format!("{} is a draft, skipping", path.display()));
            return Ok(());
        }
        if let Some(file) = self.catalog.by_path(path) {
            let file = file.clone();
            self.emit_file(&file)?;
        }
        Ok(())
    }

    /// Scaffolds a new site at `root`: `site.ini`, `content/`, `templates/`.
    /// Refuses when `root` already contains a site.
    pub fn init(root: &Path) -> Result<PathBuf> {
        let root = absolutize(root)?;
        if root.join(CONFIG_FILE).exists() {
            return Err(Error::AlreadyExists(root));
        }
        fs::create_dir_all(root.join("content"))?;
        fs::create_dir_all(root.join("templates"))?;
        fs::write(
            root.join(CONFIG_FILE),
            concat!(
                "title = \"my new site\"\n",
                "description = \"my new site description\"\n",
                "\n",
                "; Root url for the site. Can be a local path too.\n",
                "url = \"http://127.0.0.1/\"\n",
                "\n",
                "; How the '|date' filter prints dates.\n",
                "dateFormat = \"yyyy-MM-dd\"\n",
            ),
        )?;
        Ok(root)
    }

    /// Creates a fresh draft entry under the content directory, named
    /// `<yyyyMMdd>-new-entry.md`, and returns its path.
    pub fn add_entry(&self) -> Result<PathBuf> {
        let today = chrono::Local::now().format("%Y%m%d").to_string();
        fs::create_dir_all(&self.content_dir)?;
        let path = self.content_dir.join(format!("{}-new-entry.md", today));
        fs::write(
            &path,
            format!(
                concat!(
                    "---\n",
                    "title = \"New entry\"\n",
                    "slug = \"new-entry\"\n",
                    "date = \"{}\"\n",
                    "category = \"blog\"\n",
                    "draft = \"true\"\n",
                    "---\n",
                    "\n",
                    "Your content here.\n",
                ),
                today
            ),
        )?;
        Ok(path)
    }
}

impl TemplateSource for Site {
    /// Loads `templates/<name>`. A missing or unreadable template is a
    /// warning, not an error; callers substitute the empty string.
    fn load(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }
        let path = self.templates_dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(_) => {
                logger::warn(&format!("template '{}' not found", path.display()));
                None
            }
        }
    }
}

/// The result of a site-level operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or building a [`Site`].
#[derive(Debug)]
pub enum Error {
    /// Returned when `site.ini` is missing. Fatal: nothing can be built
    /// without a base URL.
    MissingConfig(PathBuf),

    /// Returned when the configured `url` doesn't parse as an absolute URL.
    InvalidBaseUrl(String),

    /// Returned by [`Site::init`] when the target already contains a site.
    AlreadyExists(PathBuf),

    /// Returned when the content scan fails.
    Catalog(catalog::Error),

    /// Returned when a single file fails to load in watch mode.
    File(content::Error),

    /// Returned for other I/O errors.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingConfig(path) => write!(f, "{} not found", path.display()),
            Error::InvalidBaseUrl(url) => {
                write!(f, "'{}' is not a valid absolute base url", url)
            }
            Error::AlreadyExists(root) => {
                write!(f, "{} already contains a site", root.display())
            }
            Error::Catalog(err) => err.fmt(f),
            Error::File(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingConfig(_) => None,
            Error::InvalidBaseUrl(_) => None,
            Error::AlreadyExists(_) => None,
            Error::Catalog(err) => Some(err),
            Error::File(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for I/O.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<catalog::Error> for Error {
    /// Converts a [`catalog::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator when scanning.
    fn from(err: catalog::Error) -> Error {
        Error::Catalog(err)
    }
}
