//! Listener hub between venue clients and the rest of the core: routes
//! data events into the `PriceStore`, forwards connection status to an
//! application-level `StatusListener`, and fans out start/stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;

use crate::config::SessionConfig;
use crate::error::ObserverError;
use crate::models::{Quote, Venue};
use crate::scanner::ArbitrageScanner;
use crate::store::PriceStore;
use crate::venue::{VenueAdapter, VenueClient, VenueListener};

/// Application-level venue connection status callback, independent of
/// the per-quote `VenueListener` that feeds the store.
pub trait StatusListener: Send + Sync {
    fn on_connected(&self, _venue: Venue) {}
    fn on_disconnected(&self, _venue: Venue) {}
    fn on_error(&self, _venue: Venue, _message: String) {}
}

pub struct NullStatusListener;
impl StatusListener for NullStatusListener {}

/// Forwards venue events into the store and the status listener. Kept
/// separate from `DataManager` so it can be constructed before the
/// venue clients that need to hold a reference to it.
struct DataRouter {
    store: Arc<PriceStore>,
    status: Arc<dyn StatusListener>,
}

impl VenueListener for DataRouter {
    fn on_connected(&self, venue: Venue) {
        self.status.on_connected(venue);
    }
    fn on_disconnected(&self, venue: Venue) {
        self.status.on_disconnected(venue);
    }
    fn on_error(&self, venue: Venue, message: String) {
        self.status.on_error(venue, message);
    }
    fn on_data_received(&self, quote: Quote) {
        self.store.update(quote);
    }
}

pub struct DataManager {
    clients: Vec<Arc<VenueClient>>,
    scanner: Arc<ArbitrageScanner>,
    running: AtomicBool,
}

impl DataManager {
    pub fn new(
        store: Arc<PriceStore>,
        status: Arc<dyn StatusListener>,
        adapters: Vec<Arc<dyn VenueAdapter>>,
        session_config: SessionConfig,
        scanner: Arc<ArbitrageScanner>,
    ) -> Result<Self, ObserverError> {
        if adapters.is_empty() {
            return Err(ObserverError::ConfigError(
                "no venue clients configured".to_string(),
            ));
        }

        let router: Arc<dyn VenueListener> = Arc::new(DataRouter { store, status });
        let clients = adapters
            .into_iter()
            .map(|adapter| Arc::new(VenueClient::new(adapter, router.clone(), session_config.clone())))
            .collect();

        Ok(Self {
            clients,
            scanner,
            running: AtomicBool::new(false),
        })
    }

    /// Idempotent. Starts all venue clients concurrently, then the
    /// scanner.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        join_all(self.clients.iter().map(|c| c.start())).await;
        self.scanner.start().await;
    }

    /// Idempotent. Stops the scanner before the venue clients, so no
    /// opportunity is ever emitted from a partially shut-down feed.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.scanner.stop().await;
        join_all(self.clients.iter().map(|c| c.stop())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_client_set() {
        let store = Arc::new(PriceStore::new());
        let config = crate::config::AppConfig::default();
        let scanner = Arc::new(ArbitrageScanner::new(
            store.clone(),
            &config,
            Arc::new(|_| {}),
        ));
        let err = DataManager::new(
            store,
            Arc::new(NullStatusListener),
            Vec::new(),
            SessionConfig::default(),
            scanner,
        )
        .unwrap_err();
        assert!(matches!(err, ObserverError::ConfigError(_)));
    }
}
