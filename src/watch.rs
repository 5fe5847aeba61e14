//! Watch mode: observes the content directory and re-emits changed files
//! through [`Site::refresh`]. Events are debounced so a burst of writes to the
//! same file (editors tend to write, truncate, and rename) turns into a single
//! refresh, and editor temp files are ignored outright.

use crate::logger;
use crate::site::{self, Site};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// How long to keep collecting events before refreshing.
const DEBOUNCE: Duration = Duration::from_millis(300);

/// How long to block waiting for the first event of a burst.
const IDLE: Duration = Duration::from_secs(60);

/// Whether `path` looks like an editor artifact rather than site content.
fn is_ignored(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return true,
    };
    if name.starts_with('.') || name.starts_with('_') || name.ends_with('~') {
        return true;
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("swp") | Some("swo") | Some("tmp") | Some("bak")
    )
}

/// Whether an event kind can change what the site looks like.
const fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Watches `site`'s content directory until the watcher channel closes,
/// refreshing each changed path. Refresh failures are logged; the loop keeps
/// running.
pub fn run(site: &mut Site) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(site.content_dir(), RecursiveMode::Recursive)?;
    logger::info(&format!(
        "watching {} (ctrl-c to stop)",
        site.content_dir().display()
    ));

    let mut pending: HashSet<PathBuf> = HashSet::new();
    loop {
        let timeout = if pending.is_empty() { IDLE } else { DEBOUNCE };
        match rx.recv_timeout(timeout) {
            Ok(Ok(Event { kind, paths, .. })) if is_relevant(&kind) => {
                pending.extend(paths.into_iter().filter(|p| !is_ignored(p)));
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => logger::warn(&format!("watch error: {}", err)),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                for path in pending.drain() {
                    if let Err(err) = site.refresh(&path) {
                        logger::error(&format!("refreshing '{}': {}", path.display(), err));
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

/// The result of running the watch loop.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error setting up or running the watch loop.
#[derive(Debug)]
pub enum Error {
    /// Returned when the filesystem watcher can't be created or attached.
    Notify(notify::Error),

    /// Returned when the site fails in a way a single refresh can't absorb.
    Site(site::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Notify(err) => err.fmt(f),
            Error::Site(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Notify(err) => Some(err),
            Error::Site(err) => Some(err),
        }
    }
}

impl From<notify::Error> for Error {
    /// Converts a [`notify::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator when setting up the watcher.
    fn from(err: notify::Error) -> Error {
        Error::Notify(err)
    }
}

impl From<site::Error> for Error {
    /// Converts a [`site::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator when refreshing.
    fn from(err: site::Error) -> Error {
        Error::Site(err)
    }
}
