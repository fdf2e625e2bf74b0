//! Wires the store, venue clients, and scanner from configuration, and
//! exposes the single start/stop surface embedders use.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::data_manager::{DataManager, NullStatusListener, StatusListener};
use crate::models::Venue;
use crate::scanner::{ArbitrageScanner, OpportunityCallback};
use crate::store::PriceStore;
use crate::venue::{BinanceAdapter, BybitAdapter, GateioAdapter, VenueAdapter};

pub struct Application {
    data_manager: DataManager,
    store: Arc<PriceStore>,
}

impl Application {
    pub fn new(config: AppConfig, on_opportunities: OpportunityCallback) -> anyhow::Result<Self> {
        Self::with_status_listener(config, on_opportunities, Arc::new(NullStatusListener))
    }

    pub fn with_status_listener(
        config: AppConfig,
        on_opportunities: OpportunityCallback,
        status: Arc<dyn StatusListener>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(PriceStore::new());
        let scanner = Arc::new(ArbitrageScanner::new(store.clone(), &config, on_opportunities));

        let adapters: Vec<Arc<dyn VenueAdapter>> = config
            .exchanges_to_monitor
            .iter()
            .map(|venue| build_adapter(*venue))
            .collect();

        let data_manager = DataManager::new(
            store.clone(),
            status,
            adapters,
            config.session.clone(),
            scanner,
        )?;

        Ok(Self { data_manager, store })
    }

    pub async fn start(&self) {
        self.data_manager.start().await;
    }

    pub async fn stop(&self) {
        self.data_manager.stop().await;
    }

    pub fn store(&self) -> &Arc<PriceStore> {
        &self.store
    }
}

fn build_adapter(venue: Venue) -> Arc<dyn VenueAdapter> {
    match venue {
        Venue::Binance => Arc::new(BinanceAdapter::new()),
        Venue::Bybit => Arc::new(BybitAdapter::new()),
        Venue::Gateio => Arc::new(GateioAdapter::new()),
    }
}
