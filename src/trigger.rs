//! Closing-bracket trigger: shorten the URL of a `[[url]` link as it is closed.
//!
//! Typing `]` always inserts the bracket first. Afterwards the text right
//! before the bracket is inspected; when it is a URL token opened by `[[`,
//! the configured [`Shortener`] gets the URL and its span. Every other case
//! is a silent no-op.

use std::sync::{Arc, PoisonError, RwLock};

use log::debug;

use crate::host::{Host, Span};
use crate::keymap::{Binding, KeyCommand, Keymap};
use crate::shorten::Shortener;

pub const TRIGGER_KEY: char = ']';

/// Opening marker of a bracketed link.
pub const LINK_OPEN: &str = "[[";

pub struct TriggerHandler {
    shortener: RwLock<Arc<dyn Shortener>>,
}

impl TriggerHandler {
    pub fn new(shortener: Arc<dyn Shortener>) -> Self {
        Self {
            shortener: RwLock::new(shortener),
        }
    }

    /// Swap the shortening callable. Takes effect on the next trigger.
    pub fn set_shortener(&self, shortener: Arc<dyn Shortener>) {
        *self.shortener.write().unwrap_or_else(PoisonError::into_inner) = shortener;
    }

    pub fn shortener(&self) -> Arc<dyn Shortener> {
        Arc::clone(&self.shortener.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Insert `repeat_count` brackets, then shorten the URL they close.
    ///
    /// A count of 0 is treated as 1.
    pub fn handle_trigger(&self, host: &mut dyn Host, repeat_count: usize) {
        let count = repeat_count.max(1);
        let anchor = host.cursor_position();
        host.insert_text(&TRIGGER_KEY.to_string(), count, true);
        let after = host.cursor_position();

        // Query with the cursor on the anchor itself. Asking from anywhere
        // else can pick up the tail of a neighboring link.
        host.set_cursor_position(anchor);
        match link_url_at(host, anchor) {
            Some((url, span)) => {
                debug!("trigger: shortening {url} at [{}, {})", span.start, span.end);
                self.shortener().shorten(host, &url, span.start, span.end);
                // The cursor sits on the anchor, moved along by any edit the
                // shortener already made. Put it back after the brackets.
                let anchor_now = host.cursor_position();
                host.set_cursor_position(anchor_now + count);
            }
            None => host.set_cursor_position(after),
        }
    }
}

/// The URL ending at `anchor` and its span, if it opens a `[[` link.
fn link_url_at(host: &dyn Host, anchor: usize) -> Option<(String, Span)> {
    let Some(url) = host.url_at(anchor) else {
        debug!("trigger: no URL at {anchor}");
        return None;
    };
    let Some(span) = host.url_span_at(anchor).filter(|s| !s.is_empty()) else {
        debug!("trigger: no span for {url} at {anchor}");
        return None;
    };
    let marker_len = LINK_OPEN.chars().count();
    if span.start < marker_len {
        debug!("trigger: {url} starts at {}, no room for {LINK_OPEN}", span.start);
        return None;
    }
    let before = host.substring(span.start - marker_len, span.start);
    if before != LINK_OPEN {
        debug!("trigger: {url} preceded by {before:?}, not a link");
        return None;
    }
    Some((url, span))
}

impl KeyCommand for TriggerHandler {
    fn run(&self, host: &mut dyn Host, _key: char, count: usize) {
        self.handle_trigger(host, count);
    }
}

/// Bind the trigger to `]` in `mode`. Installing the same handler twice is a no-op.
pub fn install(keymap: &mut Keymap, mode: &str, handler: Arc<TriggerHandler>) -> Binding {
    keymap.bind(mode, TRIGGER_KEY, handler)
}
