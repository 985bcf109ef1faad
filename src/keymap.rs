//! Per-mode key bindings and keystroke dispatch.
//!
//! Pure logic, no I/O. Unbound keys self-insert, so a keymap with nothing
//! bound behaves like plain typing.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::host::Host;

/// Something a key can be bound to.
pub trait KeyCommand: Send + Sync {
    fn run(&self, host: &mut dyn Host, key: char, count: usize);
}

/// Outcome of [`Keymap::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The key had no command in this mode.
    Installed,
    /// A different command was bound and has been replaced.
    Replaced,
    /// This exact command was already bound; nothing changed.
    Unchanged,
}

#[derive(Default)]
pub struct Keymap {
    modes: HashMap<String, HashMap<char, Arc<dyn KeyCommand>>>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` in `mode`. A key holds at most one command per mode.
    pub fn bind(&mut self, mode: &str, key: char, command: Arc<dyn KeyCommand>) -> Binding {
        let keys = self.modes.entry(mode.to_string()).or_default();
        let outcome = match keys.get(&key) {
            Some(existing) if Arc::ptr_eq(existing, &command) => return Binding::Unchanged,
            Some(_) => Binding::Replaced,
            None => Binding::Installed,
        };
        keys.insert(key, command);
        debug!("keymap: {mode} {key:?} {outcome:?}");
        outcome
    }

    pub fn lookup(&self, mode: &str, key: char) -> Option<&Arc<dyn KeyCommand>> {
        self.modes.get(mode)?.get(&key)
    }

    /// Total number of bindings across all modes.
    pub fn len(&self) -> usize {
        self.modes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle one keystroke typed `count` times (0 counts as 1).
    ///
    /// Returns true if a bound command ran, false if the key self-inserted.
    pub fn dispatch(&self, mode: &str, key: char, count: usize, host: &mut dyn Host) -> bool {
        let count = count.max(1);
        match self.lookup(mode, key) {
            Some(command) => {
                command.run(host, key, count);
                true
            }
            None => {
                host.insert_text(&key.to_string(), count, false);
                false
            }
        }
    }
}
