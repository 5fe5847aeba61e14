//! The library code for the `minipress` static site generator. A build can
//! be generally broken down into three distinct steps:
//!
//! 1. Loading the site configuration and scanning the content tree into a
//!    catalog of classified files ([`crate::site`], [`crate::catalog`],
//!    [`crate::content`])
//! 2. Expanding each content document's macros against its metadata
//!    ([`crate::expand`], [`crate::meta`], [`crate::filter`])
//! 3. Rendering Markdown and writing the results into the output tree
//!    ([`crate::markdown`], [`crate::site`])
//!
//! The second step is the interesting one. Every document carries a metadata
//! dictionary assembled from its frontmatter, its filename, and the site
//! configuration, and the expansion engine runs four ordered passes over the
//! document text: template includes, category indexes, document references,
//! and finally tag substitution with optional filters. Watch mode
//! ([`crate::watch`]) reuses the same machinery one file at a time.

pub mod catalog;
pub mod content;
pub mod expand;
pub mod filter;
pub mod logger;
pub mod markdown;
pub mod meta;
pub mod site;
pub mod watch;
