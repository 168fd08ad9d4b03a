use std::time::Duration;

use crate::att::MAX_VAL_LEN;

/// GATT server configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of simultaneously connected centrals.
    pub max_connections: usize,
    /// Maximum number of pending notifications and indications per
    /// connection.
    pub queue_capacity: usize,
    /// Time to wait for an indication confirmation before the indication is
    /// considered failed.
    pub indication_timeout: Duration,
    /// Maximum number of queued payloads sent per drain tick.
    pub drain_batch: usize,
    /// Maximum length of written values and pushed payloads.
    pub max_value_len: usize,
}

impl Config {
    /// Sets the maximum number of simultaneously connected centrals.
    #[inline]
    #[must_use]
    pub const fn with_max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    /// Sets the per-connection queue capacity.
    #[inline]
    #[must_use]
    pub const fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    /// Sets the indication confirmation timeout.
    #[inline]
    #[must_use]
    pub const fn with_indication_timeout(mut self, d: Duration) -> Self {
        self.indication_timeout = d;
        self
    }

    /// Sets the maximum number of payloads sent per drain tick.
    #[inline]
    #[must_use]
    pub const fn with_drain_batch(mut self, n: usize) -> Self {
        self.drain_batch = n;
        self
    }

    /// Sets the maximum value length.
    #[inline]
    #[must_use]
    pub const fn with_max_value_len(mut self, n: usize) -> Self {
        self.max_value_len = n;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_connections: 1,
            queue_capacity: 32,
            indication_timeout: Duration::from_secs(5),
            drain_batch: 8,
            max_value_len: MAX_VAL_LEN,
        }
    }
}
