//! Download configuration constants and the driver's tunables

use std::time::Duration;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Default klines endpoint path.
pub const DEFAULT_KLINES_ENDPOINT: &str = "/api/v3/klines";

/// Candles requested per call when nothing else is configured.
pub const DEFAULT_PAGE_LIMIT: u32 = 1000;

/// Largest page the klines endpoint accepts.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Per-request HTTP timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Attempts per window before the fetcher reports failure.
pub const MAX_RETRIES: u32 = 5;

/// Backoff before the first retry in milliseconds; doubled per further retry.
pub const INITIAL_BACKOFF_MS: u64 = 200;

/// Pause between successful requests in milliseconds.
pub const REQUEST_DELAY_MS: u64 = 200;

/// Cooldown after a window failed entirely, in seconds.
pub const ERROR_COOLDOWN_SECS: u64 = 60;

/// Checkpoint after every N non-empty requests.
pub const CHECKPOINT_EVERY_REQUESTS: u64 = 50;

/// Consecutive empty windows tolerated before the run is aborted.
pub const MAX_CONSECUTIVE_EMPTY_WINDOWS: u32 = 100;

/// Start of the first-trading-date probe window (2010-01-01T00:00:00Z).
pub const EARLIEST_PROBE_MS: i64 = 1_262_304_000_000;

/// Exponential backoff: `base * 2^attempt`, `attempt` counted from zero.
pub fn calculate_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// What the driver does when a window fails with a non-retryable error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermanentErrorPolicy {
    /// Cool down and retry the same window
    #[default]
    Retry,
    /// Stop the run; buffered data is still written
    Abort,
}

impl std::str::FromStr for PermanentErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "retry" => Ok(PermanentErrorPolicy::Retry),
            "abort" => Ok(PermanentErrorPolicy::Abort),
            _ => Err(format!(
                "Invalid permanent error policy: {s}. Valid options: retry, abort"
            )),
        }
    }
}

/// Tunables for [`crate::downloader::BackfillDriver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillConfig {
    /// Pause after each non-empty result
    pub request_delay: Duration,
    /// Pause before retrying a window the fetcher gave up on
    pub error_cooldown: Duration,
    /// Checkpoint every N non-empty requests (0 disables periodic checkpoints)
    pub checkpoint_every: u64,
    /// Abort once consecutive empty windows exceed this
    pub max_empty_windows: u32,
    /// Look up the first trading timestamp before starting
    pub probe_first_trade: bool,
    /// Reaction to non-retryable errors
    pub permanent_error_policy: PermanentErrorPolicy,
    /// Abort after one window failed this many times in a row; `None` retries forever
    pub max_window_failures: Option<u32>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(REQUEST_DELAY_MS),
            error_cooldown: Duration::from_secs(ERROR_COOLDOWN_SECS),
            checkpoint_every: CHECKPOINT_EVERY_REQUESTS,
            max_empty_windows: MAX_CONSECUTIVE_EMPTY_WINDOWS,
            probe_first_trade: true,
            permanent_error_policy: PermanentErrorPolicy::Retry,
            max_window_failures: None,
        }
    }
}

impl BackfillConfig {
    /// Set the inter-request delay
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Set the cooldown after a failed window
    pub fn with_error_cooldown(mut self, cooldown: Duration) -> Self {
        self.error_cooldown = cooldown;
        self
    }

    /// Set the checkpoint cadence
    pub fn with_checkpoint_every(mut self, every: u64) -> Self {
        self.checkpoint_every = every;
        self
    }

    /// Set the empty-window ceiling
    pub fn with_max_empty_windows(mut self, max: u32) -> Self {
        self.max_empty_windows = max;
        self
    }

    /// Enable or disable the first-trading-date probe
    pub fn with_probe(mut self, probe: bool) -> Self {
        self.probe_first_trade = probe;
        self
    }

    /// Set the permanent error policy
    pub fn with_permanent_error_policy(mut self, policy: PermanentErrorPolicy) -> Self {
        self.permanent_error_policy = policy;
        self
    }

    /// Bound the number of consecutive failures of a single window
    pub fn with_max_window_failures(mut self, max: Option<u32>) -> Self {
        self.max_window_failures = max;
        self
    }
}
