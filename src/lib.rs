pub mod buffer;
pub mod config;
pub mod host;
pub mod keymap;
pub mod session;
pub mod shorten;
pub mod trigger;
pub mod url;
