use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the service

/// HeyGen API key, read once at startup from HEYGEN_API_KEY.
/// Empty string means "not configured" — startup fails fast in main.
pub static HEYGEN_API_KEY: Lazy<String> = Lazy::new(|| {
    env::var("HEYGEN_API_KEY").unwrap_or_else(|_| String::new())
});

/// Base URL of the HeyGen API.
/// Override with HEYGEN_API_BASE_URL for staging/mock environments.
pub static HEYGEN_API_BASE_URL: Lazy<String> = Lazy::new(|| {
    env::var("HEYGEN_API_BASE_URL").unwrap_or_else(|_| "https://api.heygen.com".to_string())
});

/// Path to the SQLite database file.
pub static DATABASE_PATH: Lazy<String> = Lazy::new(|| {
    env::var("DATABASE_PATH").unwrap_or_else(|_| "avagen.sqlite".to_string())
});

/// Shared secret for the /reconcile trigger endpoint.
/// When set, callers must present `Authorization: Bearer <secret>`.
/// When unset the endpoint is open (fine for localhost-only deployments).
pub static CRON_SECRET: Lazy<Option<String>> = Lazy::new(|| {
    env::var("CRON_SECRET").ok().filter(|s| !s.is_empty())
});

/// Port for the HTTP trigger server.
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000)
});

/// Reconciliation scheduler configuration
pub mod reconcile {
    use super::{env, Duration, Lazy};

    /// Interval between reconciliation passes (in seconds).
    /// Read from RECONCILE_INTERVAL_SECS, default 120 (2 minutes).
    pub static CHECK_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("RECONCILE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120)
    });

    /// Scheduler tick interval duration
    pub fn check_interval() -> Duration {
        Duration::from_secs(*CHECK_INTERVAL_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Per-call timeout for provider HTTP requests (in seconds)
    pub const PROVIDER_TIMEOUT_SECS: u64 = 10;

    /// Provider request timeout duration
    pub fn provider_timeout() -> Duration {
        Duration::from_secs(PROVIDER_TIMEOUT_SECS)
    }
}

/// Credit accounting configuration
pub mod credits {
    /// One credit covers this many seconds of rendered video.
    pub const SECONDS_PER_CREDIT: f64 = 60.0;
}

/// Video generation defaults applied when the request omits a field
pub mod defaults {
    /// Default avatar rendering style
    pub const AVATAR_STYLE: &str = "normal";

    /// Default output aspect ratio
    pub const ASPECT_RATIO: &str = "16:9";
}
