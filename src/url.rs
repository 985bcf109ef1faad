use regex::Regex;
use std::sync::LazyLock;

use crate::host::Span;

/// Regex for URL tokens starting with `http://` or `https://`.
///
/// Pattern approach inspired by John Gruber's "liberal URL regex":
/// <https://mathiasbynens.be/demo/url-regex>
///
/// - Matches `https?://` followed by non-whitespace, non-bracket characters.
///   Stopping at `]` keeps the token inside `[[url][description]]` links.
/// - Balanced `(...)` groups belong to the URL, so
///   `https://en.wikipedia.org/wiki/Rust_(programming_language)` stays whole
///   while the `)` closing a prose parenthesis does not.
/// - Strips trailing punctuation (`. , ; : ! ? - ' "`) that is typically
///   not part of the URL but part of the surrounding prose.
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"https?://(?:\([^\s()<>\]]*\)|[^\s<>()\]\}])*(?:\([^\s()<>\]]*\)|[^\s<>()\]\}.,:;!?\-'"])"#,
    )
    .unwrap()
});

/// A URL token and its character span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlToken {
    pub span: Span,
    pub text: String,
}

/// Find every URL token in `text`, with spans in character offsets.
pub fn find_urls(text: &str) -> Vec<UrlToken> {
    let mut tokens = Vec::new();
    // Regex offsets are bytes; walk forward once to convert them to chars.
    let mut byte_pos = 0;
    let mut char_pos = 0;
    for m in URL_RE.find_iter(text) {
        char_pos += text[byte_pos..m.start()].chars().count();
        let start = char_pos;
        char_pos += m.as_str().chars().count();
        byte_pos = m.end();
        tokens.push(UrlToken {
            span: Span::new(start, char_pos),
            text: m.as_str().to_string(),
        });
    }
    tokens
}

/// The URL token whose span includes `pos` or ends exactly at `pos`.
pub fn url_at(text: &str, pos: usize) -> Option<UrlToken> {
    find_urls(text)
        .into_iter()
        .take_while(|t| t.span.start <= pos)
        .find(|t| t.span.contains_or_ends_at(pos))
}
