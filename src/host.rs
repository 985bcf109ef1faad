//! Editor capability consumed by the trigger and the shortening backends.
//!
//! All positions are 0-based character offsets into the buffer text.
//! A real editor binds this trait to its own buffer; [`crate::buffer::TextBuffer`]
//! is the in-memory binding used by the CLI and the tests.

/// Half-open character range `[start, end)` of a recognized URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// True if `pos` lies inside the span or sits right after its last char.
    pub fn contains_or_ends_at(&self, pos: usize) -> bool {
        self.start <= pos && pos <= self.end
    }
}

/// Buffer operations the trigger needs from the host editor.
pub trait Host {
    fn cursor_position(&self) -> usize;

    /// Insert `count` copies of `text` at the cursor and move the cursor past them.
    ///
    /// `undo_boundary` starts a new undo group before the insertion.
    fn insert_text(&mut self, text: &str, count: usize, undo_boundary: bool);

    /// Text of the URL token at `pos`, if any.
    fn url_at(&self, pos: usize) -> Option<String>;

    /// Span of the URL token at `pos`, if any.
    fn url_span_at(&self, pos: usize) -> Option<Span>;

    /// Text in `[start, end)`. Out-of-range bounds are clamped.
    fn substring(&self, start: usize, end: usize) -> String;

    fn set_cursor_position(&mut self, pos: usize);

    /// Replace the text in `span` with `text`.
    fn replace_range(&mut self, span: Span, text: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_len_and_empty() {
        assert_eq!(Span::new(2, 12).len(), 10);
        assert!(!Span::new(2, 12).is_empty());
        assert!(Span::new(4, 4).is_empty());
        assert_eq!(Span::new(5, 3).len(), 0);
    }

    #[test]
    fn span_contains_or_ends_at() {
        let span = Span::new(2, 12);
        assert!(span.contains_or_ends_at(2));
        assert!(span.contains_or_ends_at(7));
        assert!(span.contains_or_ends_at(12));
        assert!(!span.contains_or_ends_at(1));
        assert!(!span.contains_or_ends_at(13));
    }
}
