use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use log::{debug, info};
use serde::Deserialize;

use crate::host::Host;
use crate::shorten::{self, HttpService, Inline, PendingReplacements, Shortener};

// ---------------------------------------------------------------------------
// ConfigFile — deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// `is.gd`, `tinyurl` or `none`.
    pub service: Option<String>,
    /// Shorten on a worker thread instead of blocking the keystroke.
    pub deferred: Option<bool>,
    pub timeout_ms: Option<u64>,
    /// Editing mode the trigger is installed in.
    pub mode: Option<String>,
}

// ---------------------------------------------------------------------------
// Config — resolved (all fields concrete)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    IsGd,
    TinyUrl,
    /// Leave URLs alone.
    Disabled,
}

impl ServiceKind {
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "is.gd" | "isgd" => Ok(Self::IsGd),
            "tinyurl" => Ok(Self::TinyUrl),
            "none" | "off" => Ok(Self::Disabled),
            other => bail!("unknown shortening service '{other}' (expected is.gd, tinyurl or none)"),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub service: ServiceKind,
    pub deferred: bool,
    pub timeout: Duration,
    pub mode: String,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, service: Option<String>, deferred: bool, mode: Option<String>) {
        if let Some(ref v) = service {
            debug!("config: CLI override service={v}");
            self.service = service;
        }
        if deferred {
            debug!("config: CLI override deferred=true");
            self.deferred = Some(true);
        }
        if let Some(ref v) = mode {
            debug!("config: CLI override mode={v}");
            self.mode = mode;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> anyhow::Result<Config> {
        let service = match self.service.as_deref() {
            Some(name) => ServiceKind::parse(name)?,
            None => ServiceKind::IsGd,
        };
        let config = Config {
            service,
            deferred: self.deferred.unwrap_or(false),
            timeout: Duration::from_millis(self.timeout_ms.unwrap_or(5000)),
            mode: self.mode.unwrap_or_else(|| "org".into()),
        };
        info!(
            "config: resolved service={:?}, deferred={}, timeout={}ms, mode={}",
            config.service,
            config.deferred,
            config.timeout.as_millis(),
            config.mode,
        );
        Ok(config)
    }
}

impl Config {
    /// Build the configured shortening callable.
    ///
    /// Deferred shorteners also return the queue their results arrive on.
    pub fn shortener(&self) -> (Arc<dyn Shortener>, Option<PendingReplacements>) {
        let service = match self.service {
            ServiceKind::IsGd => HttpService::is_gd(self.timeout),
            ServiceKind::TinyUrl => HttpService::tinyurl(self.timeout),
            ServiceKind::Disabled => {
                let noop = |_: &mut dyn Host, url: &str, _: usize, _: usize| {
                    debug!("shorten: disabled, keeping {url}");
                };
                return (Arc::new(noop), None);
            }
        };
        if self.deferred {
            let (shortener, pending) = shorten::deferred(service);
            (Arc::new(shortener), Some(pending))
        } else {
            (Arc::new(Inline::new(service)), None)
        }
    }
}

/// Resolve the XDG config path for urlshrink.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config"))
        })?;
    Some(config_dir.join("urlshrink").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    load_config_from(&path)
}

/// Load config from an explicit path, treating a missing file as empty.
pub fn load_config_from(path: &std::path::Path) -> anyhow::Result<ConfigFile> {
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
