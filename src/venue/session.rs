//! Session state machine shared by every venue client.
//!
//! Ported from a Binance-specific session manager into a per-venue
//! generic one: same state machine and backoff/heartbeat building
//! blocks, minus the multi-endpoint circuit breaker and resync
//! coordinator, which this system has no use for (every venue here
//! speaks to exactly one WebSocket URL, and quote upserts are
//! idempotent so there's nothing to "resync").

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::info;

use crate::config::SessionConfig;

/// Connection state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Subscribing,
    Streaming,
    Disconnecting,
    Backoff,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Subscribing => write!(f, "SUBSCRIBING"),
            Self::Streaming => write!(f, "STREAMING"),
            Self::Disconnecting => write!(f, "DISCONNECTING"),
            Self::Backoff => write!(f, "BACKOFF"),
        }
    }
}

/// Reason for a state transition, carried through for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Started,
    ConnectSuccess,
    SubscribeSuccess,
    SymbolDiscoveryFailed,
    PongTimeout,
    DataStale,
    ServerClose,
    NetworkError,
    StopRequested,
    BackoffElapsed,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::ConnectSuccess => write!(f, "connect_ok"),
            Self::SubscribeSuccess => write!(f, "subscribe_ok"),
            Self::SymbolDiscoveryFailed => write!(f, "symbol_discovery_failed"),
            Self::PongTimeout => write!(f, "pong_timeout"),
            Self::DataStale => write!(f, "data_stale"),
            Self::ServerClose => write!(f, "server_close"),
            Self::NetworkError => write!(f, "network_error"),
            Self::StopRequested => write!(f, "stop_requested"),
            Self::BackoffElapsed => write!(f, "backoff_elapsed"),
        }
    }
}

/// Deterministic exponential backoff, `min(base * 2^attempt, max)`, no
/// jitter: this is a small fleet of venue sessions, not a thundering
/// fleet of thousands, so the extra complexity isn't worth it here.
#[derive(Debug)]
pub struct BackoffCalculator {
    base_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl BackoffCalculator {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            base_ms: config.backoff_base_ms,
            max_ms: config.backoff_max_ms,
            attempt: 0,
        }
    }

    pub fn next_backoff(&mut self) -> Duration {
        let exp = self.attempt.min(32);
        let base = (self.base_ms as f64) * 2f64.powi(exp as i32);
        let capped = base.min(self.max_ms as f64);
        self.attempt += 1;
        Duration::from_millis(capped as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Result of a heartbeat check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    Ok,
    SendPing,
    PongTimeout,
    DataStale,
}

/// Heartbeat monitoring for connection health: ping cadence, pong
/// timeout, and data staleness.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    ping_interval: Duration,
    pong_timeout: Duration,
    stale_timeout: Duration,
    last_ping_sent: Option<Instant>,
    awaiting_pong: bool,
    last_data_received: Instant,
}

impl HeartbeatMonitor {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            ping_interval: Duration::from_millis(config.ping_interval_ms),
            pong_timeout: Duration::from_millis(config.pong_timeout_ms),
            stale_timeout: Duration::from_millis(config.stale_data_timeout_ms),
            last_ping_sent: None,
            awaiting_pong: false,
            last_data_received: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.last_ping_sent = None;
        self.awaiting_pong = false;
        self.last_data_received = Instant::now();
    }

    #[inline]
    pub fn record_data_received(&mut self) {
        self.last_data_received = Instant::now();
    }

    pub fn record_ping_sent(&mut self) {
        self.last_ping_sent = Some(Instant::now());
        self.awaiting_pong = true;
    }

    pub fn record_pong_received(&mut self) {
        self.awaiting_pong = false;
    }

    pub fn check(&mut self) -> HeartbeatAction {
        let now = Instant::now();

        if self.awaiting_pong {
            if let Some(ping_time) = self.last_ping_sent {
                if now.duration_since(ping_time) > self.pong_timeout {
                    return HeartbeatAction::PongTimeout;
                }
            }
        }

        if now.duration_since(self.last_data_received) > self.stale_timeout {
            return HeartbeatAction::DataStale;
        }

        let should_ping = match self.last_ping_sent {
            None => true,
            Some(ping_time) => now.duration_since(ping_time) > self.ping_interval,
        };

        if should_ping && !self.awaiting_pong {
            return HeartbeatAction::SendPing;
        }

        HeartbeatAction::Ok
    }

    /// How long until the next check is worth making.
    pub fn time_until_next_check(&self) -> Duration {
        let now = Instant::now();
        let stale_check = self.stale_timeout / 2;
        let ping_check = match self.last_ping_sent {
            None => Duration::ZERO,
            Some(ping_time) => {
                let elapsed = now.duration_since(ping_time);
                self.ping_interval.saturating_sub(elapsed)
            }
        };
        stale_check.min(ping_check).max(Duration::from_millis(100))
    }
}

/// Session-lifetime counters for observability.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    pub connections_attempted: AtomicU64,
    pub connections_succeeded: AtomicU64,
    pub reconnections: AtomicU64,
    pub pong_timeouts: AtomicU64,
    pub data_stale_events: AtomicU64,
}

impl SessionMetrics {
    #[inline]
    pub fn record_connect_attempt(&self) {
        self.connections_attempted.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn record_connect_success(&self) {
        self.connections_succeeded.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn record_reconnection(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn record_pong_timeout(&self) {
        self.pong_timeouts.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn record_data_stale(&self) {
        self.data_stale_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> String {
        format!(
            "connects={}/{} reconnects={} pong_timeouts={} stale={}",
            self.connections_succeeded.load(Ordering::Relaxed),
            self.connections_attempted.load(Ordering::Relaxed),
            self.reconnections.load(Ordering::Relaxed),
            self.pong_timeouts.load(Ordering::Relaxed),
            self.data_stale_events.load(Ordering::Relaxed),
        )
    }
}

/// Ties state, backoff, and heartbeat together for one venue session.
pub struct SessionManager {
    venue: &'static str,
    state: RwLock<SessionState>,
    backoff: RwLock<BackoffCalculator>,
    heartbeat: RwLock<HeartbeatMonitor>,
    metrics: SessionMetrics,
}

impl SessionManager {
    pub fn new(venue: &'static str, config: &SessionConfig) -> Self {
        Self {
            venue,
            state: RwLock::new(SessionState::Idle),
            backoff: RwLock::new(BackoffCalculator::new(config)),
            heartbeat: RwLock::new(HeartbeatMonitor::new(config)),
            metrics: SessionMetrics::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn transition(&self, new_state: SessionState, reason: TransitionReason) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };

        match new_state {
            SessionState::Connecting => {
                self.metrics.record_connect_attempt();
            }
            SessionState::Subscribing => {
                // The dial succeeded; reset the reconnect attempt counter here
                // rather than on Streaming, so a venue that connects fine but
                // keeps failing symbol discovery doesn't escalate its backoff.
                self.metrics.record_connect_success();
                self.backoff.write().reset();
            }
            SessionState::Streaming => {
                self.heartbeat.write().reset();
            }
            SessionState::Backoff => {
                self.metrics.record_reconnection();
                match reason {
                    TransitionReason::PongTimeout => self.metrics.record_pong_timeout(),
                    TransitionReason::DataStale => self.metrics.record_data_stale(),
                    _ => {}
                }
            }
            _ => {}
        }

        info!(
            venue = self.venue,
            from = %old_state,
            to = %new_state,
            reason = %reason,
            "session_transition"
        );
    }

    pub fn next_backoff(&self) -> Duration {
        self.backoff.write().next_backoff()
    }

    pub fn backoff_attempt(&self) -> u32 {
        self.backoff.read().attempt()
    }

    #[inline]
    pub fn record_data_received(&self) {
        self.heartbeat.write().record_data_received();
    }

    pub fn record_ping_sent(&self) {
        self.heartbeat.write().record_ping_sent();
    }

    pub fn record_pong_received(&self) {
        self.heartbeat.write().record_pong_received();
    }

    pub fn check_heartbeat(&self) -> HeartbeatAction {
        self.heartbeat.write().check()
    }

    pub fn heartbeat_check_interval(&self) -> Duration {
        self.heartbeat.read().time_until_next_check()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = SessionConfig {
            backoff_base_ms: 1_000,
            backoff_max_ms: 5_000,
            ..SessionConfig::default()
        };
        let mut backoff = BackoffCalculator::new(&config);
        assert_eq!(backoff.next_backoff(), Duration::from_millis(1_000));
        assert_eq!(backoff.next_backoff(), Duration::from_millis(2_000));
        assert_eq!(backoff.next_backoff(), Duration::from_millis(4_000));
        assert_eq!(backoff.next_backoff(), Duration::from_millis(5_000));
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Duration::from_millis(1_000));
    }

    #[test]
    fn heartbeat_wants_ping_before_first_send() {
        let config = SessionConfig {
            ping_interval_ms: 100,
            stale_data_timeout_ms: 10_000,
            ..SessionConfig::default()
        };
        let mut monitor = HeartbeatMonitor::new(&config);
        assert_eq!(monitor.check(), HeartbeatAction::SendPing);
        monitor.record_ping_sent();
        monitor.record_data_received();
        assert_eq!(monitor.check(), HeartbeatAction::Ok);
        monitor.record_pong_received();
    }

    #[test]
    fn session_manager_resets_backoff_on_successful_dial() {
        let config = SessionConfig::default();
        let manager = SessionManager::new("test", &config);

        assert_eq!(manager.state(), SessionState::Idle);
        manager.transition(SessionState::Connecting, TransitionReason::Started);
        manager.transition(SessionState::Backoff, TransitionReason::NetworkError);
        manager.next_backoff();
        assert!(manager.backoff_attempt() > 0);

        manager.transition(SessionState::Connecting, TransitionReason::BackoffElapsed);
        manager.transition(SessionState::Subscribing, TransitionReason::ConnectSuccess);
        assert_eq!(manager.backoff_attempt(), 0);
        manager.transition(
            SessionState::Streaming,
            TransitionReason::SubscribeSuccess,
        );
        assert_eq!(
            manager
                .metrics()
                .connections_succeeded
                .load(Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn repeated_symbol_discovery_failure_does_not_escalate_backoff() {
        let config = SessionConfig::default();
        let manager = SessionManager::new("test", &config);

        for _ in 0..3 {
            manager.transition(SessionState::Connecting, TransitionReason::BackoffElapsed);
            manager.transition(SessionState::Subscribing, TransitionReason::ConnectSuccess);
            assert_eq!(manager.backoff_attempt(), 0);
            manager.transition(SessionState::Backoff, TransitionReason::SymbolDiscoveryFailed);
            let delay = manager.next_backoff();
            assert_eq!(delay, Duration::from_millis(config.backoff_base_ms));
        }
    }
}
