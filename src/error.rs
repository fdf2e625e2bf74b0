//! Error categories for propagation policy.
//!
//! These are kinds, not a replacement for `anyhow`: REST plumbing, JSON
//! glue, and runtime wiring still flow through `anyhow::Result` the way
//! the rest of the codebase does. `ObserverError` exists for the seams
//! that need a named category — session transitions and listener
//! notifications — so callers can match on `kind()` without parsing
//! error strings.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ObserverError {
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("failed to decode protocol frame: {0}")]
    ProtocolDecode(String),

    #[error("venue rejected subscription: {0}")]
    ProtocolNack(String),

    #[error("symbol discovery failed: {0}")]
    SymbolDiscoveryFailure(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    FatalInternal(String),
}

impl ObserverError {
    /// Whether this kind should trigger a reconnect of the owning session.
    pub fn is_reconnect_worthy(&self) -> bool {
        matches!(
            self,
            ObserverError::TransientNetwork(_) | ObserverError::SymbolDiscoveryFailure(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ObserverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_discovery_failures_are_reconnect_worthy() {
        assert!(ObserverError::TransientNetwork("closed".into()).is_reconnect_worthy());
        assert!(ObserverError::SymbolDiscoveryFailure("empty".into()).is_reconnect_worthy());
        assert!(!ObserverError::ProtocolDecode("bad json".into()).is_reconnect_worthy());
        assert!(!ObserverError::ConfigError("no venues".into()).is_reconnect_worthy());
    }
}
