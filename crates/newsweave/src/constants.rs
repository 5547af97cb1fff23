//! Shared constants.

use std::time::Duration;

/// Per-request timeout applied to every outbound HTTP call.
pub const DEFAULT_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect-phase timeout applied to every outbound HTTP call.
pub const DEFAULT_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Browser-like user agent sent by all scrapers. Several upstreams serve
/// reduced or empty pages to obvious bot user agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Width of the rate limiter's sliding window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Maximum retry attempts for one HTTP request (initial try included).
pub const HTTP_MAX_ATTEMPTS: u32 = 3;

/// Lower bound of the retry backoff.
pub const HTTP_BACKOFF_MIN: Duration = Duration::from_secs(1);

/// Upper bound of the retry backoff.
pub const HTTP_BACKOFF_MAX: Duration = Duration::from_secs(10);
