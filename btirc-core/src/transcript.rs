//! Transcript sink shared by the discovery, inbound and session tasks.
//! Every line is written whole under one lock, so concurrent producers never interleave
//! characters; ordering between producers is whatever order they reach the lock.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

/// Output channel of a transcript line: chat and discovery output vs. degraded-path notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Out,
    Err,
}

#[derive(Clone)]
pub struct Transcript {
    inner: Arc<Inner>,
}

enum Inner {
    Console(Mutex<()>),
    Capture(Mutex<Vec<(Channel, String)>>),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Transcript {
    /// Transcript on stdout/stderr.
    pub fn console() -> Self {
        Self {
            inner: Arc::new(Inner::Console(Mutex::new(()))),
        }
    }

    /// In-memory transcript; read back with [`Transcript::lines`].
    pub fn capture() -> Self {
        Self {
            inner: Arc::new(Inner::Capture(Mutex::new(Vec::new()))),
        }
    }

    pub fn line(&self, text: impl AsRef<str>) {
        self.emit(Channel::Out, text.as_ref());
    }

    pub fn error(&self, text: impl AsRef<str>) {
        self.emit(Channel::Err, text.as_ref());
    }

    /// Append one line to the given channel.
    pub fn emit(&self, channel: Channel, text: &str) {
        match self.inner.as_ref() {
            Inner::Console(m) => {
                let _guard = lock(m);
                // Console write failures are dropped.
                let _ = match channel {
                    Channel::Out => {
                        let mut out = std::io::stdout().lock();
                        writeln!(out, "{}", text).and_then(|_| out.flush())
                    }
                    Channel::Err => {
                        let mut err = std::io::stderr().lock();
                        writeln!(err, "{}", text).and_then(|_| err.flush())
                    }
                };
            }
            Inner::Capture(lines) => lock(lines).push((channel, text.to_string())),
        }
    }

    /// Captured lines in append order. Empty for a console transcript.
    pub fn lines(&self) -> Vec<(Channel, String)> {
        match self.inner.as_ref() {
            Inner::Console(_) => Vec::new(),
            Inner::Capture(lines) => lock(lines).clone(),
        }
    }

    /// Captured lines of one channel.
    pub fn channel_lines(&self, channel: Channel) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, l)| l)
            .collect()
    }
}
