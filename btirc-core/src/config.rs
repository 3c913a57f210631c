//! Session tunables shared by the inbound logger and the session driver.

use std::time::Duration;

use serde::Deserialize;

/// Default read chunk for incoming messages.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default pause between retries after a failed inbound read.
pub const DEFAULT_READ_RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Maximum bytes taken from the stream per read.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Milliseconds to wait after a failed read before reading again. 0 retries immediately.
    #[serde(default = "default_read_retry_backoff_ms")]
    pub read_retry_backoff_ms: u64,
}

fn default_read_chunk_size() -> usize {
    DEFAULT_READ_CHUNK_SIZE
}
fn default_read_retry_backoff_ms() -> u64 {
    DEFAULT_READ_RETRY_BACKOFF.as_millis() as u64
}

impl Config {
    pub fn read_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.read_retry_backoff_ms)
    }

    /// Chunk size clamped to at least one byte.
    pub fn chunk_size(&self) -> usize {
        self.read_chunk_size.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_chunk_size: default_read_chunk_size(),
            read_retry_backoff_ms: default_read_retry_backoff_ms(),
        }
    }
}
