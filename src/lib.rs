//! Cross-exchange arbitrage observer.
//!
//! Ingests live spot order-book top-of-book quotes from Binance, Bybit,
//! and Gate.io, stores the latest quote per (venue, symbol), and
//! periodically scans for cross-venue spreads above a configured
//! threshold.

pub mod app;
pub mod config;
pub mod data_manager;
pub mod error;
pub mod models;
pub mod scanner;
pub mod store;
pub mod venue;
pub mod worker;

pub use app::Application;
pub use config::AppConfig;
pub use data_manager::{DataManager, StatusListener};
pub use error::ObserverError;
pub use models::{Opportunity, Quote, Venue};
pub use scanner::OpportunityCallback;
pub use store::PriceStore;
pub use worker::AsyncWorker;
