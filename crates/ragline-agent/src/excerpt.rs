//! Source excerpts: page meta-descriptions with a truncated-content fallback.

use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Characters of chunk content kept when a page has no meta-description.
pub const SOURCE_EXCERPT_CHARS: usize = 200;
/// Characters of the top result quoted by the fallback answer.
pub const FALLBACK_EXCERPT_CHARS: usize = 300;
/// Marker appended to truncated excerpts.
pub const ELLIPSIS: &str = "...";

fn meta_selector() -> Option<&'static Selector> {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    SELECTOR
        .get_or_init(|| Selector::parse("meta[content]").ok())
        .as_ref()
}

/// The page's meta-description, if the markup carries a non-empty one.
///
/// Prefers `<meta name="description">` and falls back to
/// `<meta property="og:description">`. Keys match case-insensitively;
/// entities are decoded by the parser and whitespace is collapsed.
pub fn extract_meta_description(html: &str) -> Option<String> {
    let selector = meta_selector()?;
    let document = Html::parse_document(html);
    let mut og_description = None;

    for element in document.select(selector) {
        let meta = element.value();
        let Some(key) = meta.attr("name").or_else(|| meta.attr("property")) else {
            continue;
        };
        let content = collapse_whitespace(meta.attr("content").unwrap_or_default());
        if content.is_empty() {
            continue;
        }
        if key.eq_ignore_ascii_case("description") {
            return Some(content);
        }
        if key.eq_ignore_ascii_case("og:description") && og_description.is_none() {
            og_description = Some(content);
        }
    }

    og_description
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The first `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Chunk-content excerpt: the first `max_chars` characters followed by
/// [`ELLIPSIS`].
pub fn content_excerpt(content: &str, max_chars: usize) -> String {
    format!("{}{ELLIPSIS}", truncate_chars(content.trim(), max_chars))
}

/// Excerpt shown for a source: the meta-description from `markup` when there
/// is one, else a [`SOURCE_EXCERPT_CHARS`]-character content excerpt.
pub fn source_excerpt(markup: Option<&str>, content: &str) -> String {
    markup
        .and_then(extract_meta_description)
        .unwrap_or_else(|| content_excerpt(content, SOURCE_EXCERPT_CHARS))
}
