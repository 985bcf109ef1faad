//! Editing session: a buffer, a keymap with the trigger installed, and the
//! queue of deferred replacements.
//!
//! Each keystroke is dispatched and then the replacement queue is drained,
//! the same poll-then-drain rhythm an interactive editor loop would use.

use std::sync::Arc;

use log::debug;

use crate::buffer::TextBuffer;
use crate::config::Config;
use crate::keymap::Keymap;
use crate::shorten::{PendingReplacements, Shortener};
use crate::trigger::{self, TriggerHandler};

pub struct Session {
    buffer: TextBuffer,
    keymap: Keymap,
    mode: String,
    handler: Arc<TriggerHandler>,
    pending: Option<PendingReplacements>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        let (shortener, pending) = config.shortener();
        Self::with_shortener(&config.mode, shortener, pending)
    }

    pub fn with_shortener(
        mode: &str,
        shortener: Arc<dyn Shortener>,
        pending: Option<PendingReplacements>,
    ) -> Self {
        let handler = Arc::new(TriggerHandler::new(shortener));
        let mut keymap = Keymap::new();
        trigger::install(&mut keymap, mode, Arc::clone(&handler));
        Self {
            buffer: TextBuffer::new(),
            keymap,
            mode: mode.to_string(),
            handler,
            pending,
        }
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut TextBuffer {
        &mut self.buffer
    }

    pub fn set_mode(&mut self, mode: &str) {
        self.mode = mode.to_string();
    }

    pub fn handler(&self) -> &TriggerHandler {
        &self.handler
    }

    /// Type one key `count` times.
    pub fn press(&mut self, key: char, count: usize) {
        self.keymap.dispatch(&self.mode, key, count, &mut self.buffer);
        if let Some(pending) = &mut self.pending {
            let applied = pending.drain_into(&mut self.buffer);
            if applied > 0 {
                debug!("session: applied {applied} deferred replacement(s)");
            }
        }
    }

    /// Type `text` one character at a time.
    pub fn type_text(&mut self, text: &str) {
        for key in text.chars() {
            self.press(key, 1);
        }
    }

    /// Wait for outstanding deferred shortenings and return the final text.
    pub fn finish(self) -> String {
        let Session {
            mut buffer,
            keymap,
            handler,
            pending,
            ..
        } = self;
        // Dropping the last handler reference drops the shortener and with it
        // the deferred sender; only in-flight workers keep the queue open.
        drop(keymap);
        drop(handler);
        if let Some(pending) = pending {
            let applied = pending.finish_into(&mut buffer);
            debug!("session: applied {applied} replacement(s) at finish");
        }
        buffer.text().to_string()
    }
}
