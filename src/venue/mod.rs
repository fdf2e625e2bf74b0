pub mod binance;
pub mod bybit;
pub mod gateio;
pub mod session;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::models::{Quote, Venue};
use crate::venue::session::{SessionManager, SessionState, TransitionReason};

pub use binance::BinanceAdapter;
pub use bybit::BybitAdapter;
pub use gateio::GateioAdapter;

/// Per-venue hooks a `VenueClient` drives through the shared session
/// state machine. Symbol discovery and subscription encoding happen
/// once per connection; ping/pong classification and frame decoding
/// happen on every message.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> Venue;
    fn ws_url(&self) -> &'static str;

    /// Fetch the tradeable symbol list over HTTPS. An empty result is
    /// treated as `SymbolDiscoveryFailure` by the caller.
    async fn fetch_symbols(&self) -> anyhow::Result<Vec<String>>;

    /// Encode `symbols` into one or more subscribe frames, already
    /// chunked to this venue's per-message argument limit.
    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Message>;

    /// A client-initiated keepalive frame, sent on the session's ping
    /// interval. `None` means this venue relies on transport-level
    /// pings instead (Binance).
    fn client_ping_frame(&self) -> Option<Message> {
        None
    }

    /// If `frame` is a server-sent application-level ping, the reply
    /// frame to send back. Venues without an app-level ping channel
    /// never match.
    fn handle_server_ping(&self, _frame: &Message) -> Option<Message> {
        None
    }

    /// Whether `frame` is the application-level pong answering our own
    /// `client_ping_frame`.
    fn is_pong(&self, _frame: &Message) -> bool {
        false
    }

    /// If `frame` is a subscribe-acknowledgement reporting failure, the
    /// message to surface via `on_error`. Frames that aren't subscribe
    /// acks (or acks reporting success) never match.
    fn check_nack(&self, _frame: &Message) -> Option<String> {
        None
    }

    /// Decode a data frame into zero or more quotes. Frames that don't
    /// carry book data (acks, unrelated channels) decode to an empty
    /// vec; malformed JSON is an `Err` so the caller can surface it via
    /// `on_error` instead of silently dropping it.
    fn decode(&self, frame: &Message) -> Result<Vec<Quote>, String>;
}

/// Listener for venue client lifecycle and data events.
///
/// `on_connected` always precedes any `on_data_received` for a given
/// session, and `on_disconnected` is emitted at most once per session
/// end; see `VenueClient::run_session`.
pub trait VenueListener: Send + Sync {
    fn on_connected(&self, _venue: Venue) {}
    fn on_disconnected(&self, _venue: Venue) {}
    fn on_error(&self, _venue: Venue, _message: String) {}
    fn on_data_received(&self, _quote: Quote) {}
}

/// No-op listener for venue clients run without a `DataManager`.
pub struct NullListener;
impl VenueListener for NullListener {}

/// Owns one venue's WebSocket session: connect, subscribe, stream,
/// reconnect with backoff, repeat until stopped.
pub struct VenueClient {
    adapter: Arc<dyn VenueAdapter>,
    listener: Arc<dyn VenueListener>,
    session: Arc<SessionManager>,
    config: SessionConfig,
    cancel: Arc<Notify>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl VenueClient {
    pub fn new(
        adapter: Arc<dyn VenueAdapter>,
        listener: Arc<dyn VenueListener>,
        config: SessionConfig,
    ) -> Self {
        let venue_name = adapter.venue().as_str();
        Self {
            session: Arc::new(SessionManager::new(leak_venue_name(venue_name), &config)),
            adapter,
            listener,
            config,
            cancel: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn venue(&self) -> Venue {
        self.adapter.venue()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Idempotent: spawns the session-supervisor task if not already
    /// running.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let adapter = self.adapter.clone();
        let listener = self.listener.clone();
        let session = self.session.clone();
        let config = self.config.clone();
        let cancel = self.cancel.clone();
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            run_supervisor(adapter, listener, session, config, cancel).await;
            running.store(false, Ordering::SeqCst);
        });

        *self.task.lock().await = Some(handle);
    }

    /// Idempotent: requests cooperative shutdown, then waits up to the
    /// configured deadline before forcibly aborting the session task.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.cancel.notify_waiters();

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let abort_handle = handle.abort_handle();
            let deadline = Duration::from_millis(self.config.shutdown_deadline_ms);
            if tokio::time::timeout(deadline, handle).await.is_err() {
                warn!(
                    venue = %self.adapter.venue(),
                    "shutdown deadline exceeded, aborting session task"
                );
                abort_handle.abort();
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }
}

async fn run_supervisor(
    adapter: Arc<dyn VenueAdapter>,
    listener: Arc<dyn VenueListener>,
    session: Arc<SessionManager>,
    config: SessionConfig,
    cancel: Arc<Notify>,
) {
    let venue = adapter.venue();
    let mut reason = TransitionReason::Started;

    loop {
        session.transition(SessionState::Connecting, reason);

        match connect_and_stream(&adapter, &listener, &session, &config, &cancel).await {
            Ok(WhyStopped::Cancelled) => {
                session.transition(SessionState::Disconnecting, TransitionReason::StopRequested);
                listener.on_disconnected(venue);
                return;
            }
            Ok(WhyStopped::RemoteClosed) => {
                listener.on_disconnected(venue);
                reason = TransitionReason::ServerClose;
            }
            Err(e) => {
                listener.on_error(venue, e.to_string());
                listener.on_disconnected(venue);
                reason = TransitionReason::NetworkError;
            }
        }

        session.transition(SessionState::Backoff, reason);
        let delay = session.next_backoff();
        if session.backoff_attempt() > config.max_reconnect_attempts {
            listener.on_error(
                venue,
                format!(
                    "exceeded {} reconnect attempts",
                    config.max_reconnect_attempts
                ),
            );
            if config.hard_stop_after_max_attempts {
                listener.on_error(venue, "hard-stopping after max reconnect attempts".to_string());
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.notified() => return,
        }
        reason = TransitionReason::BackoffElapsed;
    }
}

enum WhyStopped {
    Cancelled,
    RemoteClosed,
}

async fn connect_and_stream(
    adapter: &Arc<dyn VenueAdapter>,
    listener: &Arc<dyn VenueListener>,
    session: &Arc<SessionManager>,
    config: &SessionConfig,
    cancel: &Arc<Notify>,
) -> anyhow::Result<WhyStopped> {
    let (ws_stream, _) = connect_async(adapter.ws_url())
        .await
        .map_err(|e| anyhow::anyhow!("connect failed: {e}"))?;
    session.transition(SessionState::Subscribing, TransitionReason::ConnectSuccess);
    listener.on_connected(adapter.venue());

    let (mut write, mut read) = ws_stream.split();

    let symbols = adapter
        .fetch_symbols()
        .await
        .map_err(|e| anyhow::anyhow!("symbol discovery failed: {e}"))?;
    if symbols.is_empty() {
        anyhow::bail!("symbol discovery returned an empty list");
    }

    for msg in adapter.build_subscribe_messages(&symbols) {
        write
            .send(msg)
            .await
            .map_err(|e| anyhow::anyhow!("subscribe send failed: {e}"))?;
    }

    session.transition(SessionState::Streaming, TransitionReason::SubscribeSuccess);
    info!(venue = %adapter.venue(), symbols = symbols.len(), "streaming");

    let read_timeout = Duration::from_millis(config.read_timeout_ms);

    loop {
        let next_check = session.heartbeat_check_interval();

        tokio::select! {
            _ = tokio::time::sleep(next_check) => {
                match session.check_heartbeat() {
                    session::HeartbeatAction::SendPing => {
                        if let Some(frame) = adapter.client_ping_frame() {
                            write.send(frame).await.map_err(|e| anyhow::anyhow!("ping send failed: {e}"))?;
                        }
                        session.record_ping_sent();
                    }
                    session::HeartbeatAction::PongTimeout => {
                        anyhow::bail!("pong not received within timeout");
                    }
                    session::HeartbeatAction::DataStale => {
                        anyhow::bail!("no data received within staleness window");
                    }
                    session::HeartbeatAction::Ok => {}
                }
            }
            frame = tokio::time::timeout(read_timeout, read.next()) => {
                let frame = match frame {
                    Err(_) => anyhow::bail!("read timed out"),
                    Ok(None) => return Ok(WhyStopped::RemoteClosed),
                    Ok(Some(Err(e))) => anyhow::bail!("read error: {e}"),
                    Ok(Some(Ok(msg))) => msg,
                };

                match &msg {
                    Message::Ping(payload) => {
                        write.send(Message::Pong(payload.clone())).await.ok();
                    }
                    Message::Pong(_) => {
                        session.record_pong_received();
                    }
                    Message::Close(_) => {
                        return Ok(WhyStopped::RemoteClosed);
                    }
                    Message::Text(_) | Message::Binary(_) => {
                        if let Some(reply) = adapter.handle_server_ping(&msg) {
                            write.send(reply).await.ok();
                        } else if adapter.is_pong(&msg) {
                            session.record_pong_received();
                        } else if let Some(nack) = adapter.check_nack(&msg) {
                            listener.on_error(adapter.venue(), nack);
                        } else {
                            match adapter.decode(&msg) {
                                Ok(quotes) if !quotes.is_empty() => {
                                    session.record_data_received();
                                    for quote in quotes {
                                        listener.on_data_received(quote);
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    listener.on_error(
                                        adapter.venue(),
                                        format!("protocol decode error: {e}"),
                                    );
                                }
                            }
                        }
                    }
                    Message::Frame(_) => {}
                }
            }
            _ = cancel.notified() => {
                write.send(Message::Close(None)).await.ok();
                return Ok(WhyStopped::Cancelled);
            }
        }
    }
}

/// Venue names are a fixed, small, `'static` set; leak once per client
/// rather than threading a lifetime through `SessionManager`.
fn leak_venue_name(name: &str) -> &'static str {
    Box::leak(name.to_string().into_boxed_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingListener {
        events: parking_lot::Mutex<Vec<String>>,
    }

    impl VenueListener for RecordingListener {
        fn on_connected(&self, venue: Venue) {
            self.events.lock().push(format!("connected:{venue}"));
        }
        fn on_disconnected(&self, venue: Venue) {
            self.events.lock().push(format!("disconnected:{venue}"));
        }
        fn on_error(&self, venue: Venue, message: String) {
            self.events.lock().push(format!("error:{venue}:{message}"));
        }
        fn on_data_received(&self, quote: Quote) {
            self.events.lock().push(format!("data:{}", quote.symbol));
        }
    }

    #[test]
    fn null_listener_never_panics() {
        let listener = NullListener;
        listener.on_connected(Venue::Binance);
        listener.on_disconnected(Venue::Binance);
        listener.on_error(Venue::Binance, "ignored".into());
        listener.on_data_received(Quote::new(Venue::Binance, "BTCUSDT"));
    }

    #[test]
    fn recording_listener_captures_sequence() {
        let listener = RecordingListener {
            events: parking_lot::Mutex::new(Vec::new()),
        };
        listener.on_connected(Venue::Bybit);
        listener.on_data_received(Quote::new(Venue::Bybit, "ETHUSDT"));
        listener.on_disconnected(Venue::Bybit);

        let events = listener.events.lock();
        assert_eq!(events[0], "connected:Bybit");
        assert_eq!(events[1], "data:ETHUSDT");
        assert_eq!(events[2], "disconnected:Bybit");
    }

    /// Never resolves: dialing port 1 on loopback fails immediately
    /// with connection-refused, so this exercises the reconnect loop
    /// without needing a real venue endpoint.
    struct UnreachableAdapter;

    #[async_trait]
    impl VenueAdapter for UnreachableAdapter {
        fn venue(&self) -> Venue {
            Venue::Binance
        }
        fn ws_url(&self) -> &'static str {
            "ws://127.0.0.1:1"
        }
        async fn fetch_symbols(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["BTCUSDT".to_string()])
        }
        fn build_subscribe_messages(&self, _symbols: &[String]) -> Vec<Message> {
            Vec::new()
        }
        fn decode(&self, _frame: &Message) -> Result<Vec<Quote>, String> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn hard_stop_terminates_the_supervisor_loop() {
        let adapter: Arc<dyn VenueAdapter> = Arc::new(UnreachableAdapter);
        let listener: Arc<dyn VenueListener> = Arc::new(NullListener);
        let config = SessionConfig {
            backoff_base_ms: 1,
            backoff_max_ms: 5,
            max_reconnect_attempts: 1,
            hard_stop_after_max_attempts: true,
            ..SessionConfig::default()
        };
        let session = Arc::new(SessionManager::new("test", &config));
        let cancel = Arc::new(Notify::new());

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_supervisor(adapter, listener, session, config, cancel),
        )
        .await;

        assert!(
            result.is_ok(),
            "hard_stop_after_max_attempts should return instead of retrying forever"
        );
    }
}
