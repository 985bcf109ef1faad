//! In-memory text buffer implementing [`Host`].
//!
//! Backs the CLI replay loop and the tests. Positions are character offsets;
//! the text is stored as a `String`. The cursor keeps its byte offset next to
//! its char offset, so lookups near the cursor (which is where typing happens)
//! only walk the distance from the cursor, never the whole buffer.

use log::debug;

use crate::host::{Host, Span};
use crate::url::{self, UrlToken};

/// One entry of the undo log.
enum UndoEntry {
    /// Start of an undo group, with the cursor to restore.
    Boundary { cursor: usize, cursor_byte: usize },
    /// `inserted` bytes at byte offset `at` replaced `removed`.
    Edit {
        at: usize,
        removed: String,
        inserted: usize,
    },
}

#[derive(Default)]
pub struct TextBuffer {
    text: String,
    chars: usize,
    cursor: usize,
    cursor_byte: usize,
    undo_log: Vec<UndoEntry>,
    boundaries: usize,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding `text` with the cursor at its end.
    pub fn from_text(text: &str) -> Self {
        let chars = text.chars().count();
        Self {
            text: text.to_string(),
            chars,
            cursor: chars,
            cursor_byte: text.len(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn len_chars(&self) -> usize {
        self.chars
    }

    /// Number of undo groups available.
    pub fn undo_depth(&self) -> usize {
        self.boundaries
    }

    /// Revert every edit made since the most recent undo boundary.
    /// Returns false if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.boundaries == 0 {
            return false;
        }
        while let Some(entry) = self.undo_log.pop() {
            match entry {
                UndoEntry::Edit {
                    at,
                    removed,
                    inserted,
                } => {
                    let current = self.text[at..at + inserted].chars().count();
                    self.chars = self.chars - current + removed.chars().count();
                    self.text.replace_range(at..at + inserted, &removed);
                }
                UndoEntry::Boundary {
                    cursor,
                    cursor_byte,
                } => {
                    self.cursor = cursor;
                    self.cursor_byte = cursor_byte;
                    self.boundaries -= 1;
                    break;
                }
            }
        }
        true
    }

    fn record_edit(&mut self, at: usize, removed: &str, inserted: usize) {
        if self.boundaries == 0 {
            return;
        }
        // Plain typing extends the previous insertion instead of growing the log.
        if let Some(UndoEntry::Edit {
            at: prev_at,
            inserted: prev_inserted,
            ..
        }) = self.undo_log.last_mut()
            && removed.is_empty()
            && *prev_at + *prev_inserted == at
        {
            *prev_inserted += inserted;
            return;
        }
        self.undo_log.push(UndoEntry::Edit {
            at,
            removed: removed.to_string(),
            inserted,
        });
    }

    /// Byte offset of char `pos`, walking from the cursor or the buffer start,
    /// whichever is closer.
    fn byte_offset(&self, pos: usize) -> usize {
        if pos >= self.chars {
            return self.text.len();
        }
        if pos >= self.cursor {
            advance(&self.text, self.cursor_byte, pos - self.cursor)
        } else if pos < self.cursor - pos {
            advance(&self.text, 0, pos)
        } else {
            self.text[..self.cursor_byte]
                .char_indices()
                .rev()
                .nth(self.cursor - pos - 1)
                .map_or(0, |(i, _)| i)
        }
    }

    /// The URL token at `pos`, searching only the line that contains it.
    fn url_token_at(&self, pos: usize) -> Option<UrlToken> {
        let pos = pos.min(self.chars);
        let at = self.byte_offset(pos);
        let line_start = self.text[..at].rfind('\n').map_or(0, |i| i + 1);
        let line_end = self.text[at..].find('\n').map_or(self.text.len(), |i| at + i);
        let line_start_char = pos - self.text[line_start..at].chars().count();
        let mut token = url::url_at(&self.text[line_start..line_end], pos - line_start_char)?;
        token.span = Span::new(
            token.span.start + line_start_char,
            token.span.end + line_start_char,
        );
        Some(token)
    }
}

/// Byte offset `n` chars after byte offset `from`.
fn advance(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| from + i)
}

impl Host for TextBuffer {
    fn cursor_position(&self) -> usize {
        self.cursor
    }

    fn insert_text(&mut self, text: &str, count: usize, undo_boundary: bool) {
        if undo_boundary {
            self.undo_log.push(UndoEntry::Boundary {
                cursor: self.cursor,
                cursor_byte: self.cursor_byte,
            });
            self.boundaries += 1;
        }
        let inserted = text.repeat(count);
        let at = self.cursor_byte;
        self.text.insert_str(at, &inserted);
        self.record_edit(at, "", inserted.len());
        let n = inserted.chars().count();
        self.chars += n;
        self.cursor += n;
        self.cursor_byte += inserted.len();
    }

    fn url_at(&self, pos: usize) -> Option<String> {
        self.url_token_at(pos).map(|t| t.text)
    }

    fn url_span_at(&self, pos: usize) -> Option<Span> {
        self.url_token_at(pos).map(|t| t.span)
    }

    fn substring(&self, start: usize, end: usize) -> String {
        if start >= end || start >= self.chars {
            return String::new();
        }
        let from = self.byte_offset(start);
        self.text[from..].chars().take(end - start).collect()
    }

    fn set_cursor_position(&mut self, pos: usize) {
        let pos = pos.min(self.chars);
        self.cursor_byte = self.byte_offset(pos);
        self.cursor = pos;
    }

    fn replace_range(&mut self, span: Span, text: &str) {
        let (start, end) = (span.start.min(self.chars), span.end.min(self.chars));
        if start > end {
            return;
        }
        let from = self.byte_offset(start);
        let to = advance(&self.text, from, end - start);
        let removed = self.text[from..to].to_string();
        self.text.replace_range(from..to, text);
        self.record_edit(from, &removed, text.len());

        let new_len = text.chars().count();
        self.chars = self.chars - (end - start) + new_len;
        if self.cursor >= end {
            self.cursor = self.cursor - (end - start) + new_len;
            self.cursor_byte = self.cursor_byte - (to - from) + text.len();
        } else if self.cursor > start {
            self.cursor = start + new_len;
            self.cursor_byte = from + text.len();
        }
        debug!("buffer: replaced [{start}, {end}) with {new_len} chars");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_repeats_and_advances() {
        let mut buf = TextBuffer::from_text("ab");
        buf.set_cursor_position(1);
        buf.insert_text("]", 3, true);
        assert_eq!(buf.text(), "a]]]b");
        assert_eq!(buf.cursor_position(), 4);
    }

    #[test]
    fn insert_multibyte() {
        let mut buf = TextBuffer::from_text("日本");
        buf.set_cursor_position(1);
        buf.insert_text("語", 1, false);
        assert_eq!(buf.text(), "日語本");
        assert_eq!(buf.cursor_position(), 2);
        assert_eq!(buf.len_chars(), 3);
    }

    #[test]
    fn undo_restores_boundary() {
        let mut buf = TextBuffer::from_text("x");
        buf.insert_text("y", 1, true);
        buf.insert_text("z", 1, false);
        assert_eq!(buf.text(), "xyz");
        assert!(buf.undo());
        assert_eq!(buf.text(), "x");
        assert_eq!(buf.cursor_position(), 1);
        assert!(!buf.undo());
    }

    #[test]
    fn undo_reverts_replacement() {
        let mut buf = TextBuffer::from_text("[[http://a.b");
        buf.insert_text("]", 1, true);
        buf.replace_range(Span::new(2, 12), "S");
        assert_eq!(buf.text(), "[[S]");
        assert!(buf.undo());
        assert_eq!(buf.text(), "[[http://a.b");
        assert_eq!(buf.len_chars(), 12);
        assert_eq!(buf.undo_depth(), 0);
    }

    #[test]
    fn undo_groups_are_separate() {
        let mut buf = TextBuffer::new();
        buf.insert_text("a", 1, true);
        buf.insert_text("b", 1, false);
        buf.insert_text("c", 1, true);
        assert_eq!(buf.undo_depth(), 2);
        assert!(buf.undo());
        assert_eq!(buf.text(), "ab");
        assert!(buf.undo());
        assert_eq!(buf.text(), "");
    }

    #[test]
    fn substring_clamps() {
        let buf = TextBuffer::from_text("hello");
        assert_eq!(buf.substring(1, 3), "el");
        assert_eq!(buf.substring(3, 99), "lo");
        assert_eq!(buf.substring(4, 2), "");
        assert_eq!(buf.substring(7, 9), "");
    }

    #[test]
    fn substring_either_side_of_cursor() {
        let mut buf = TextBuffer::from_text("αβγδεζηθ");
        buf.set_cursor_position(5);
        assert_eq!(buf.substring(0, 2), "αβ");
        assert_eq!(buf.substring(3, 5), "δε");
        assert_eq!(buf.substring(5, 8), "ζηθ");
    }

    #[test]
    fn cursor_clamped_to_end() {
        let mut buf = TextBuffer::from_text("abc");
        buf.set_cursor_position(10);
        assert_eq!(buf.cursor_position(), 3);
        buf.insert_text("d", 1, false);
        assert_eq!(buf.text(), "abcd");
    }

    #[test]
    fn url_queries() {
        let buf = TextBuffer::from_text("[[http://a.b]");
        assert_eq!(buf.url_at(12).as_deref(), Some("http://a.b"));
        assert_eq!(buf.url_span_at(12), Some(Span::new(2, 12)));
        assert_eq!(buf.url_span_at(0), None);
    }

    #[test]
    fn url_query_on_later_line() {
        let buf = TextBuffer::from_text("first http://x.y\n* héading\n[[http://a.b]\n");
        assert_eq!(buf.url_span_at(39), Some(Span::new(29, 39)));
        assert_eq!(buf.url_at(39).as_deref(), Some("http://a.b"));
        // The token on the first line does not leak into the third.
        assert_eq!(buf.url_span_at(27), None);
    }

    #[test]
    fn replace_shifts_cursor_after_span() {
        let mut buf = TextBuffer::from_text("[[http://example.invalid/long] tail");
        buf.replace_range(Span::new(2, 29), "http://s.b/x");
        assert_eq!(buf.text(), "[[http://s.b/x] tail");
        assert_eq!(buf.cursor_position(), 20);
        buf.insert_text("!", 1, false);
        assert_eq!(buf.text(), "[[http://s.b/x] tail!");
    }

    #[test]
    fn replace_leaves_cursor_before_span() {
        let mut buf = TextBuffer::from_text("ab http://x.y cd");
        buf.set_cursor_position(1);
        buf.replace_range(Span::new(3, 13), "S");
        assert_eq!(buf.text(), "ab S cd");
        assert_eq!(buf.cursor_position(), 1);
        buf.insert_text("-", 1, false);
        assert_eq!(buf.text(), "a-b S cd");
    }

    #[test]
    fn long_replay_stays_near_cursor() {
        let mut buf = TextBuffer::new();
        let line = "plain text without links, typed one key at a time\n";
        for _ in 0..2_000 {
            for c in line.chars() {
                buf.insert_text(&c.to_string(), 1, false);
            }
            buf.insert_text("]", 1, true);
            assert!(buf.url_at(buf.cursor_position() - 1).is_none());
        }
        assert_eq!(buf.len_chars(), 2_000 * (line.len() + 1));
        assert_eq!(buf.undo_depth(), 2_000);
    }
}
