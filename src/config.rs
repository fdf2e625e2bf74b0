//! Venue endpoints, protocol constants, and env-overridable tuning knobs.

use crate::models::Venue;

pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws/!ticker@arr";
pub const BINANCE_REST_EXCHANGE_INFO: &str =
    "https://api.binance.com/api/v3/exchangeInfo?permissions=SPOT";

pub const BYBIT_WS_URL: &str = "wss://stream.bybit.com/v5/public/spot";
pub const BYBIT_REST_INSTRUMENTS: &str =
    "https://api.bybit.com/v5/market/instruments-info?category=spot";

pub const GATEIO_WS_URL: &str = "wss://api.gateio.ws/ws/v4/";
pub const GATEIO_REST_CURRENCY_PAIRS: &str = "https://api.gateio.ws/api/v4/spot/currency_pairs";

pub const MAX_ARGS_PER_MESSAGE: usize = 10;
pub const RECONNECT_MAX_DELAY_SECONDS: u64 = 120;
pub const RECONNECT_MAX_ATTEMPTS_PER_SESSION: u32 = 5;
pub const PING_INTERVAL_SECONDS: u64 = 20;
pub const READ_TIMEOUT_SECONDS: u64 = 25;
pub const SHUTDOWN_DEADLINE_SECONDS: u64 = 5;
pub const MAX_ACCEPTABLE_PROFIT_PERCENT: f64 = 0.5;

/// Tuning knobs for a single venue session. Shared across adapters; only
/// the backoff/heartbeat timings are expected to vary in practice.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub stale_data_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub shutdown_deadline_ms: u64,
    pub max_reconnect_attempts: u32,
    /// Opt-in: terminate the reconnect loop once `max_reconnect_attempts`
    /// is exceeded, instead of logging and continuing to retry forever.
    pub hard_stop_after_max_attempts: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 1_000,
            backoff_max_ms: RECONNECT_MAX_DELAY_SECONDS * 1_000,
            ping_interval_ms: PING_INTERVAL_SECONDS * 1_000,
            pong_timeout_ms: 10_000,
            stale_data_timeout_ms: READ_TIMEOUT_SECONDS * 1_000,
            read_timeout_ms: READ_TIMEOUT_SECONDS * 1_000,
            shutdown_deadline_ms: SHUTDOWN_DEADLINE_SECONDS * 1_000,
            max_reconnect_attempts: RECONNECT_MAX_ATTEMPTS_PER_SESSION,
            hard_stop_after_max_attempts: false,
        }
    }
}

impl SessionConfig {
    /// Load from environment with defaults, mirroring the venue-tuning
    /// knobs an operator might want to adjust without a rebuild.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("ARB_BACKOFF_BASE_MS") {
            config.backoff_base_ms = v.parse().unwrap_or(config.backoff_base_ms);
        }
        if let Ok(v) = std::env::var("ARB_BACKOFF_MAX_MS") {
            config.backoff_max_ms = v.parse().unwrap_or(config.backoff_max_ms);
        }
        if let Ok(v) = std::env::var("ARB_PING_INTERVAL_MS") {
            config.ping_interval_ms = v.parse().unwrap_or(config.ping_interval_ms);
        }
        if let Ok(v) = std::env::var("ARB_STALE_DATA_TIMEOUT_MS") {
            config.stale_data_timeout_ms = v.parse().unwrap_or(config.stale_data_timeout_ms);
        }
        if let Ok(v) = std::env::var("ARB_HARD_STOP_AFTER_MAX_ATTEMPTS") {
            config.hard_stop_after_max_attempts =
                v.parse().unwrap_or(config.hard_stop_after_max_attempts);
        }

        config
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub exchanges_to_monitor: Vec<Venue>,
    pub check_interval_seconds: u64,
    pub min_profit_percent: f64,
    pub max_data_age_seconds: u64,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchanges_to_monitor: Venue::ALL.to_vec(),
            check_interval_seconds: 5,
            min_profit_percent: 0.001,
            max_data_age_seconds: 60,
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from environment with defaults. `.env` is loaded if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(v) = std::env::var("ARB_EXCHANGES") {
            let venues: anyhow::Result<Vec<Venue>> = v
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Venue>().map_err(anyhow::Error::from))
                .collect();
            config.exchanges_to_monitor = venues?;
        }

        config.check_interval_seconds = std::env::var("ARB_CHECK_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.check_interval_seconds);

        config.min_profit_percent = std::env::var("ARB_MIN_PROFIT_PERCENT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.min_profit_percent);

        config.max_data_age_seconds = std::env::var("ARB_MAX_DATA_AGE_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.max_data_age_seconds);

        config.session = SessionConfig::from_env();

        Ok(config)
    }

    pub fn ws_url(venue: Venue) -> &'static str {
        match venue {
            Venue::Binance => BINANCE_WS_URL,
            Venue::Bybit => BYBIT_WS_URL,
            Venue::Gateio => GATEIO_WS_URL,
        }
    }
}
