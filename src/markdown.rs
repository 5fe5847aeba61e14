//! Markdown to HTML rendering. Rendering is local and infallible, so a
//! document body can never be lost to a renderer failure.

use pulldown_cmark::{html, Options, Parser};

/// Renders `markdown` to an HTML string with the commonmark extensions
/// enabled: footnotes, smart punctuation, strikethrough, tables, and task
/// lists.
pub fn render(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        assert_eq!(
            render("# Hello\n\nsome *text*\n"),
            "<h1>Hello</h1>\n<p>some <em>text</em></p>\n"
        );
    }

    #[test]
    fn test_render_strikethrough_extension() {
        assert_eq!(render("~~gone~~"), "<p><del>gone</del></p>\n");
    }
}
