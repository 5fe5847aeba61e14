//! Defines [`Catalog`], the in-memory set of all [`ContentFile`]s for a site.
//! The catalog is built once by scanning the content root and is read-only
//! during emission; watch mode mutates it one file at a time through
//! [`Catalog::upsert`].

use crate::content::{self, ContentFile};
use crate::filter;
use crate::meta::MetaDict;
use chrono::NaiveDateTime;
use std::fmt;
use std::path::Path;
use url::Url;
use walkdir::{DirEntry, WalkDir};

/// The ordered collection of scanned files. Excluded at scan time: files
/// whose stem starts with `_` or `.`, hidden directories, and content files
/// marked as drafts.
#[derive(Default)]
pub struct Catalog {
    files: Vec<ContentFile>,
}

fn keep(entry: &DirEntry) -> bool {
    // The root itself is always walked, whatever its name.
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        !name.starts_with('.')
    } else {
        let stem = Path::new(name.as_ref())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        !stem.starts_with('_') && !stem.starts_with('.')
    }
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog { files: Vec::new() }
    }

    /// Walks `content_root` and loads every kept file. An unreadable content
    /// file aborts the scan; see [`ContentFile::load`].
    pub fn scan(content_root: &Path, base_url: &Url, site_meta: &MetaDict) -> Result<Catalog> {
        let mut files = Vec::new();
        for result in WalkDir::new(content_root).into_iter().filter_entry(keep) {
            let entry = result?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file = ContentFile::load(entry.path(), content_root, base_url, site_meta)?;
            if file.is_draft() {
                continue;
            }
            files.push(file);
        }
        Ok(Catalog { files })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn by_path(&self, path: &Path) -> Option<&ContentFile> {
        self.files.iter().find(|f| f.path() == path)
    }

    /// Finds the content file whose `slug` equals `slug` (exact match).
    pub fn by_slug(&self, slug: &str) -> Option<&ContentFile> {
        self.files
            .iter()
            .find(|f| f.slug().map_or(false, |s| s == slug))
    }

    /// Content files whose `category` equals `category` (case-sensitive),
    /// ordered by descending parsed date. Files with unparseable dates order
    /// as "now"; ties keep scan order.
    pub fn in_category(&self, category: &str) -> Vec<&ContentFile> {
        let now = chrono::Local::now().naive_local();
        let mut dated: Vec<(&ContentFile, NaiveDateTime)> = Vec::new();
        for file in &self.files {
            if let Some(meta) = file.meta() {
                if meta.get("category") == category {
                    dated.push((
                        file,
                        filter::try_parse_date(&meta.get("date")).unwrap_or(now),
                    ));
                }
            }
        }
        dated.sort_by(|a, b| b.1.cmp(&a.1));
        dated.into_iter().map(|(f, _)| f).collect()
    }

    /// Replaces the entry with `file`'s path, or inserts it: find-by-path,
    /// remove-if-found, insert-new. A draft is removed but not inserted, so a
    /// document edited into draft state drops out of the catalog. Returns
    /// whether the file is present afterwards.
    pub fn upsert(&mut self, file: ContentFile) -> bool {
        self.remove(file.path());
        if file.is_draft() {
            return false;
        }
        self.files.push(file);
        true
    }

    /// Removes the entry with the given path, returning whether one existed.
    pub fn remove(&mut self, path: &Path) -> bool {
        match self.files.iter().position(|f| f.path() == path) {
            Some(i) => {
                self.files.remove(i);
                true
            }
            None => false,
        }
    }
}

/// The result of a catalog scan.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error building the [`Catalog`].
#[derive(Debug)]
pub enum Error {
    /// Returned for directory-walking I/O errors.
    Walk(walkdir::Error),

    /// Returned when a content file fails to load.
    File(content::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Walk(err) => err.fmt(f),
            Error::File(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Walk(err) => Some(err),
            Error::File(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator while scanning.
    fn from(err: walkdir::Error) -> Error {
        Error::Walk(err)
    }
}

impl From<content::Error> for Error {
    /// Converts a [`content::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator while loading files.
    fn from(err: content::Error) -> Error {
        Error::File(err)
    }
}
