//! Core data model: venues, symbols, quotes, and opportunities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported spot exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Binance,
    Bybit,
    Gateio,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Binance => "Binance",
            Venue::Bybit => "Bybit",
            Venue::Gateio => "Gate.io",
        }
    }

    pub const ALL: [Venue; 3] = [Venue::Binance, Venue::Bybit, Venue::Gateio];
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Venue {
    type Err = crate::error::ObserverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binance" => Ok(Venue::Binance),
            "bybit" => Ok(Venue::Bybit),
            "gateio" | "gate.io" | "gate_io" => Ok(Venue::Gateio),
            other => Err(crate::error::ObserverError::ConfigError(format!(
                "unknown venue: {other}"
            ))),
        }
    }
}

/// An exchange-native symbol, stored in normalized (underscore-free) form.
pub type Symbol = String;

/// Normalized top-of-book quote for a single (venue, symbol) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub venue: Venue,
    pub symbol: Symbol,
    pub bid_price: Option<f64>,
    pub bid_qty: Option<f64>,
    pub ask_price: Option<f64>,
    pub ask_qty: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn new(venue: Venue, symbol: impl Into<String>) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
            bid_price: None,
            bid_qty: None,
            ask_price: None,
            ask_qty: None,
            timestamp: Utc::now(),
        }
    }

    /// Whether this quote carries both sides and can be used by the scanner.
    pub fn is_complete(&self) -> bool {
        self.bid_price.is_some() && self.ask_price.is_some()
    }

    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_milliseconds() as f64 / 1000.0
    }
}

/// A detected cross-venue arbitrage candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: Symbol,
    pub buy_venue: Venue,
    pub buy_price: f64,
    pub sell_venue: Venue,
    pub sell_price: f64,
    pub profit_percent: f64,
    pub buy_timestamp: DateTime<Utc>,
    pub sell_timestamp: DateTime<Utc>,
    pub buy_age_seconds: f64,
    pub sell_age_seconds: f64,
}
