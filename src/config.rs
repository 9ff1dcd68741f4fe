//! Signing configuration and the per-job context.
//!
//! A [`SigningContext`] is created by the caller and passed by reference into
//! credential loading, the signature engine and output finalization. It holds
//! the tunables and the clock; there is no process-wide state.

use chrono::{DateTime, FixedOffset, Local};
use std::time::Duration;

/// Default timeout for one timestamp authority round trip.
pub const DEFAULT_TSA_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes reserved for the CMS container of an untimestamped signature.
pub const DEFAULT_SIGNATURE_SIZE: usize = 8192;

/// Bytes reserved for a timestamp token.
pub const DEFAULT_TOKEN_SIZE: usize = 8192;

/// Largest `TimeStampResp` body read from an authority.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Tunables for signing.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Timeout for timestamp authority requests.
    pub tsa_timeout: Duration,

    /// Reserved size of the signature container, in bytes.
    pub signature_size: usize,

    /// Reserved size for a timestamp token, in bytes.
    pub timestamp_token_size: usize,

    /// Upper bound on a timestamp authority response body, in bytes.
    pub max_response_size: usize,

    /// User agent sent to timestamp authorities.
    pub user_agent: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            tsa_timeout: DEFAULT_TSA_TIMEOUT,
            signature_size: DEFAULT_SIGNATURE_SIZE,
            timestamp_token_size: DEFAULT_TOKEN_SIZE,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            user_agent: format!("pdf_seal/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the timestamp authority timeout.
    pub fn with_tsa_timeout(mut self, timeout: Duration) -> Self {
        self.tsa_timeout = timeout;
        self
    }

    /// Set the reserved signature container size.
    pub fn with_signature_size(mut self, size: usize) -> Self {
        self.signature_size = size;
        self
    }

    /// Set the reserved timestamp token size.
    pub fn with_timestamp_token_size(mut self, size: usize) -> Self {
        self.timestamp_token_size = size;
        self
    }

    /// Set the largest accepted timestamp authority response.
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }
}

/// Source of "now".
pub trait Clock: Send + Sync {
    /// Current local time with its UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The system clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Explicit context for one signing job.
pub struct SigningContext {
    config: SigningConfig,
    clock: Box<dyn Clock>,
}

impl Default for SigningContext {
    fn default() -> Self {
        Self::new(SigningConfig::default())
    }
}

impl SigningContext {
    /// Context with the system clock.
    pub fn new(config: SigningConfig) -> Self {
        Self {
            config,
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Current time according to the context clock.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }
}

impl std::fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("config", &self.config)
            .field("now", &self.clock.now())
            .finish()
    }
}
