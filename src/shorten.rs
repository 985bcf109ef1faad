//! Shortening backends.
//!
//! A [`Shortener`] is the callable the trigger hands `(url, start, end)` to.
//! It owns everything after that: talking to a [`ShortenService`], and
//! rewriting the buffer either right away ([`Inline`]) or later from a
//! worker thread ([`Deferred`]).
//!
//! Deferred results travel over `mpsc::channel` as [`Replacement`]s. The
//! editor loop drains [`PendingReplacements`] and applies them, so the buffer
//! is only ever touched from the editor's own thread. Each result carries how
//! many replacements had been applied when its trigger fired; the queue
//! shifts its span past any applied since.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};

use crate::host::{Host, Span};

/// The configurable shortening callable.
pub trait Shortener: Send + Sync {
    fn shorten(&self, host: &mut dyn Host, url: &str, start: usize, end: usize);
}

impl<F> Shortener for F
where
    F: Fn(&mut dyn Host, &str, usize, usize) + Send + Sync,
{
    fn shorten(&self, host: &mut dyn Host, url: &str, start: usize, end: usize) {
        self(host, url, start, end)
    }
}

/// Turns a long URL into a short one.
pub trait ShortenService: Send + Sync {
    fn name(&self) -> &str;
    fn shorten_url(&self, url: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// HTTP services
// ---------------------------------------------------------------------------

/// A shortening service reachable with a single GET request that answers
/// with the short URL as the plain-text body.
pub struct HttpService {
    name: &'static str,
    endpoint: &'static str,
    params: &'static [(&'static str, &'static str)],
    agent: ureq::Agent,
}

impl HttpService {
    /// <https://is.gd>, the default service.
    pub fn is_gd(timeout: Duration) -> Self {
        Self::new("is.gd", "https://is.gd/create.php", &[("format", "simple")], timeout)
    }

    /// <https://tinyurl.com>
    pub fn tinyurl(timeout: Duration) -> Self {
        Self::new("tinyurl", "https://tinyurl.com/api-create.php", &[], timeout)
    }

    fn new(
        name: &'static str,
        endpoint: &'static str,
        params: &'static [(&'static str, &'static str)],
        timeout: Duration,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            name,
            endpoint,
            params,
            agent,
        }
    }
}

impl ShortenService for HttpService {
    fn name(&self) -> &str {
        self.name
    }

    fn shorten_url(&self, url: &str) -> Result<String> {
        debug!("{}: requesting short form of {url}", self.name);
        let mut request = self.agent.get(self.endpoint);
        for (key, value) in self.params {
            request = request.query(*key, *value);
        }
        let mut response = request
            .query("url", url)
            .call()
            .with_context(|| format!("{} request failed", self.name))?;
        let body = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("failed to read {} response", self.name))?;
        parse_short_url(self.name, &body)
    }
}

/// Validate a plain-text service response.
fn parse_short_url(service: &str, body: &str) -> Result<String> {
    let short = body.trim();
    let looks_like_url = (short.starts_with("http://") || short.starts_with("https://"))
        && !short.contains(char::is_whitespace);
    if !looks_like_url {
        bail!("unexpected response from {service}: {short:?}");
    }
    Ok(short.to_string())
}

// ---------------------------------------------------------------------------
// Replacement
// ---------------------------------------------------------------------------

/// A finished shortening waiting to be written into the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub span: Span,
    pub original: String,
    pub shortened: String,
}

impl Replacement {
    /// Write the short URL over the original one.
    ///
    /// Skipped (returns false) when the buffer no longer holds `original` at
    /// `span.start`, e.g. because the user edited the line in the meantime.
    pub fn apply(&self, host: &mut dyn Host) -> bool {
        let start = self.span.start;
        let end = start + self.original.chars().count();
        if host.substring(start, end) != self.original {
            warn!(
                "shorten: buffer changed at {start}, dropping {} -> {}",
                self.original, self.shortened
            );
            return false;
        }
        host.replace_range(Span::new(start, end), &self.shortened);
        info!("shorten: {} -> {}", self.original, self.shortened);
        true
    }
}

// ---------------------------------------------------------------------------
// Inline
// ---------------------------------------------------------------------------

/// Shortens synchronously; the keystroke waits for the service.
pub struct Inline<S> {
    service: S,
}

impl<S: ShortenService> Inline<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S: ShortenService> Shortener for Inline<S> {
    fn shorten(&self, host: &mut dyn Host, url: &str, start: usize, end: usize) {
        match self.service.shorten_url(url) {
            Ok(shortened) => {
                Replacement {
                    span: Span::new(start, end),
                    original: url.to_string(),
                    shortened,
                }
                .apply(host);
            }
            Err(e) => warn!("shorten: {} failed for {url}: {e:#}", self.service.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Deferred
// ---------------------------------------------------------------------------

/// Shortens on a worker thread; the keystroke returns immediately.
pub struct Deferred<S> {
    service: Arc<S>,
    tx: mpsc::Sender<Queued>,
    applied: Arc<AtomicUsize>,
}

/// A worker result plus the number of replacements already in the buffer
/// when its span was taken.
struct Queued {
    seen: usize,
    replacement: Replacement,
}

/// An applied replacement, in char offsets.
#[derive(Debug, Clone, Copy)]
struct AppliedEdit {
    start: usize,
    old_len: usize,
    new_len: usize,
}

/// Receiving end for [`Deferred`] results.
pub struct PendingReplacements {
    rx: mpsc::Receiver<Queued>,
    applied: Arc<AtomicUsize>,
    history: Vec<AppliedEdit>,
}

/// Create a deferred shortener and the queue its results arrive on.
pub fn deferred<S: ShortenService + 'static>(service: S) -> (Deferred<S>, PendingReplacements) {
    let (tx, rx) = mpsc::channel();
    let applied = Arc::new(AtomicUsize::new(0));
    (
        Deferred {
            service: Arc::new(service),
            tx,
            applied: Arc::clone(&applied),
        },
        PendingReplacements {
            rx,
            applied,
            history: Vec::new(),
        },
    )
}

impl<S: ShortenService + 'static> Shortener for Deferred<S> {
    fn shorten(&self, _host: &mut dyn Host, url: &str, start: usize, end: usize) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        let seen = self.applied.load(Ordering::SeqCst);
        let url = url.to_string();
        thread::spawn(move || match service.shorten_url(&url) {
            Ok(shortened) => {
                debug!("shorten worker: {url} -> {shortened}");
                let queued = Queued {
                    seen,
                    replacement: Replacement {
                        span: Span::new(start, end),
                        original: url,
                        shortened,
                    },
                };
                if let Err(mpsc::SendError(lost)) = tx.send(queued) {
                    debug!(
                        "shorten worker: queue closed, dropping {} -> {}",
                        lost.replacement.original, lost.replacement.shortened
                    );
                }
            }
            Err(e) => warn!("shorten worker: {} failed for {url}: {e:#}", service.name()),
        });
    }
}

impl PendingReplacements {
    /// Apply every replacement that has already arrived. Non-blocking.
    /// Returns the number actually written.
    pub fn drain_into(&mut self, host: &mut dyn Host) -> usize {
        let mut applied = 0;
        while let Ok(queued) = self.rx.try_recv() {
            if self.apply(queued, host) {
                applied += 1;
            }
        }
        applied
    }

    /// Block until every sender is gone, applying results as they arrive.
    ///
    /// The [`Deferred`] itself holds a sender, so it must be dropped first or
    /// this never returns.
    pub fn finish_into(mut self, host: &mut dyn Host) -> usize {
        let mut applied = 0;
        while let Ok(queued) = self.rx.recv() {
            if self.apply(queued, host) {
                applied += 1;
            }
        }
        applied
    }

    fn apply(&mut self, queued: Queued, host: &mut dyn Host) -> bool {
        let Queued {
            seen,
            mut replacement,
        } = queued;
        let old_len = replacement.original.chars().count();
        // Only edits wholly before the span move it. An overlapping edit
        // leaves it in place and the prefix check rejects it.
        for edit in &self.history[seen.min(self.history.len())..] {
            let span = replacement.span;
            if edit.start + edit.old_len <= span.start {
                replacement.span = Span::new(
                    span.start - edit.old_len + edit.new_len,
                    span.end - edit.old_len + edit.new_len,
                );
            }
        }
        if !replacement.apply(host) {
            return false;
        }
        self.history.push(AppliedEdit {
            start: replacement.span.start,
            old_len,
            new_len: replacement.shortened.chars().count(),
        });
        self.applied.store(self.history.len(), Ordering::SeqCst);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TextBuffer;

    /// Answers every request with the same short URL.
    struct Fixed(&'static str);

    impl ShortenService for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn shorten_url(&self, _url: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl ShortenService for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn shorten_url(&self, _url: &str) -> Result<String> {
            bail!("service unavailable")
        }
    }

    #[test]
    fn parse_plain_url() {
        assert_eq!(parse_short_url("t", "https://is.gd/abc\n").unwrap(), "https://is.gd/abc");
    }

    #[test]
    fn parse_rejects_error_body() {
        assert!(parse_short_url("t", "Error: Please enter a valid URL to shorten").is_err());
        assert!(parse_short_url("t", "").is_err());
        assert!(parse_short_url("t", "https://a b").is_err());
    }

    #[test]
    fn inline_replaces_span() {
        let mut buf = TextBuffer::from_text("[[http://example.invalid/long]");
        let inline = Inline::new(Fixed("https://s.b/1"));
        inline.shorten(&mut buf, "http://example.invalid/long", 2, 29);
        assert_eq!(buf.text(), "[[https://s.b/1]");
    }

    #[test]
    fn inline_failure_leaves_buffer() {
        let mut buf = TextBuffer::from_text("[[http://a.b]");
        Inline::new(Failing).shorten(&mut buf, "http://a.b", 2, 12);
        assert_eq!(buf.text(), "[[http://a.b]");
    }

    #[test]
    fn replacement_skipped_when_text_changed() {
        let mut buf = TextBuffer::from_text("[[http://x.y]");
        let r = Replacement {
            span: Span::new(2, 12),
            original: "http://a.b".into(),
            shortened: "S".into(),
        };
        assert!(!r.apply(&mut buf));
        assert_eq!(buf.text(), "[[http://x.y]");
    }

    #[test]
    fn deferred_applies_after_drain() {
        let mut buf = TextBuffer::from_text("[[http://a.b]");
        let (shortener, pending) = deferred(Fixed("https://s.b/2"));
        shortener.shorten(&mut buf, "http://a.b", 2, 12);
        // Nothing is written until the queue is drained.
        assert_eq!(buf.text(), "[[http://a.b]");
        drop(shortener);
        assert_eq!(pending.finish_into(&mut buf), 1);
        assert_eq!(buf.text(), "[[https://s.b/2]");
    }

    #[test]
    fn deferred_failure_sends_nothing() {
        let mut buf = TextBuffer::from_text("[[http://a.b]");
        let (shortener, pending) = deferred(Failing);
        shortener.shorten(&mut buf, "http://a.b", 2, 12);
        drop(shortener);
        assert_eq!(pending.finish_into(&mut buf), 0);
        assert_eq!(buf.text(), "[[http://a.b]");
    }

    #[test]
    fn result_after_queue_closed_is_dropped() {
        let mut buf = TextBuffer::from_text("[[http://a.b]");
        let (shortener, pending) = deferred(Fixed("https://s.b/2"));
        drop(pending);
        shortener.shorten(&mut buf, "http://a.b", 2, 12);
        // The worker answers into a closed queue and logs instead of panicking.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(buf.text(), "[[http://a.b]");
    }

    fn queue(shortener: &Deferred<Fixed>, seen: usize, start: usize, end: usize, url: &str, short: &str) {
        let replacement = Replacement {
            span: Span::new(start, end),
            original: url.into(),
            shortened: short.into(),
        };
        shortener.tx.send(Queued { seen, replacement }).unwrap();
    }

    #[test]
    fn later_span_rebased_past_earlier_replacement() {
        let text = "[[http://example.invalid/first][a]] [[http://example.invalid/second][b]]";
        let mut buf = TextBuffer::from_text(text);
        let (shortener, mut pending) = deferred(Fixed("unused"));
        // Both triggers fired before either result was applied.
        queue(&shortener, 0, 2, 30, "http://example.invalid/first", "https://s.b/1");
        queue(&shortener, 0, 38, 67, "http://example.invalid/second", "https://s.b/2");
        assert_eq!(pending.drain_into(&mut buf), 2);
        assert_eq!(buf.text(), "[[https://s.b/1][a]] [[https://s.b/2][b]]");
    }

    #[test]
    fn rebase_independent_of_arrival_order() {
        let text = "[[http://example.invalid/first][a]] [[http://example.invalid/second][b]]";
        let mut buf = TextBuffer::from_text(text);
        let (shortener, mut pending) = deferred(Fixed("unused"));
        queue(&shortener, 0, 38, 67, "http://example.invalid/second", "https://s.b/2");
        queue(&shortener, 0, 2, 30, "http://example.invalid/first", "https://s.b/1");
        assert_eq!(pending.drain_into(&mut buf), 2);
        assert_eq!(buf.text(), "[[https://s.b/1][a]] [[https://s.b/2][b]]");
    }

    #[test]
    fn span_taken_after_replacement_not_shifted_again() {
        let mut buf = TextBuffer::from_text("[[http://example.invalid/first]");
        let (shortener, mut pending) = deferred(Fixed("unused"));
        queue(&shortener, 0, 2, 30, "http://example.invalid/first", "https://s.b/1");
        assert_eq!(pending.drain_into(&mut buf), 1);
        assert_eq!(shortener.applied.load(Ordering::SeqCst), 1);

        // Typed after the first result landed, so its span is already current.
        buf.insert_text(" [[http://example.invalid/second", 1, false);
        queue(&shortener, 1, 19, 48, "http://example.invalid/second", "https://s.b/2");
        assert_eq!(pending.drain_into(&mut buf), 1);
        assert_eq!(buf.text(), "[[https://s.b/1] [[https://s.b/2]");
    }

    #[test]
    fn closure_is_a_shortener() {
        let mut buf = TextBuffer::from_text("[[http://a.b]");
        let upper = |host: &mut dyn Host, url: &str, start: usize, end: usize| {
            host.replace_range(Span::new(start, end), &url.to_uppercase());
        };
        upper.shorten(&mut buf, "http://a.b", 2, 12);
        assert_eq!(buf.text(), "[[HTTP://A.B]");
    }
}
