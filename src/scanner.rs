//! Periodic cross-venue scan: wake on a fixed interval, query the
//! store, hand any opportunities to the configured callback.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::AppConfig;
use crate::models::Opportunity;
use crate::store::PriceStore;

pub type OpportunityCallback = Arc<dyn Fn(Vec<Opportunity>) + Send + Sync>;

pub struct ArbitrageScanner {
    store: Arc<PriceStore>,
    check_interval: Duration,
    min_profit_percent: f64,
    max_data_age_seconds: u64,
    callback: OpportunityCallback,
    cancel: Arc<Notify>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown_deadline: Duration,
}

impl ArbitrageScanner {
    pub fn new(store: Arc<PriceStore>, config: &AppConfig, callback: OpportunityCallback) -> Self {
        Self {
            store,
            check_interval: Duration::from_secs(config.check_interval_seconds),
            min_profit_percent: config.min_profit_percent,
            max_data_age_seconds: config.max_data_age_seconds,
            callback,
            cancel: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            shutdown_deadline: Duration::from_millis(config.session.shutdown_deadline_ms),
        }
    }

    /// Idempotent.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let store = self.store.clone();
        let interval = self.check_interval;
        let min_profit = self.min_profit_percent;
        let max_age = self.max_data_age_seconds;
        let callback = self.callback.clone();
        let cancel = self.cancel.clone();
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            loop {
                let iteration_start = Instant::now();

                let scan_result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    store.find_opportunities(min_profit, max_age)
                }));

                match scan_result {
                    Ok(opportunities) if !opportunities.is_empty() => {
                        let callback_result =
                            std::panic::catch_unwind(AssertUnwindSafe(|| (callback)(opportunities)));
                        if callback_result.is_err() {
                            warn!("opportunity callback panicked; scan loop continues");
                        }
                    }
                    Ok(_) => {}
                    Err(_) => {
                        warn!("scan iteration panicked; scan loop continues");
                    }
                }

                let elapsed = iteration_start.elapsed();
                let sleep_for = interval.saturating_sub(elapsed);

                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {}
                    _ = cancel.notified() => break,
                }
            }
            running.store(false, Ordering::SeqCst);
        });

        *self.task.lock().await = Some(handle);
    }

    /// Idempotent; cancels the scan loop and awaits it up to the
    /// configured shutdown deadline before aborting.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.cancel.notify_waiters();

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let abort_handle = handle.abort_handle();
            if tokio::time::timeout(self.shutdown_deadline, handle)
                .await
                .is_err()
            {
                warn!("scanner shutdown deadline exceeded");
                abort_handle.abort();
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Quote, Venue};
    use parking_lot::Mutex as PLMutex;

    #[tokio::test]
    async fn scan_loop_invokes_callback_with_opportunities() {
        let store = Arc::new(PriceStore::new());
        store.update(Quote {
            venue: Venue::Binance,
            symbol: "BTCUSDT".into(),
            bid_price: Some(30_000.0),
            bid_qty: Some(1.0),
            ask_price: Some(30_010.0),
            ask_qty: Some(1.0),
            timestamp: chrono::Utc::now(),
        });
        store.update(Quote {
            venue: Venue::Bybit,
            symbol: "BTCUSDT".into(),
            bid_price: Some(30_100.0),
            bid_qty: Some(1.0),
            ask_price: Some(30_110.0),
            ask_qty: Some(1.0),
            timestamp: chrono::Utc::now(),
        });

        let seen: Arc<PLMutex<Vec<Opportunity>>> = Arc::new(PLMutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let mut config = AppConfig::default();
        config.check_interval_seconds = 0;
        config.min_profit_percent = 0.001;

        let scanner = ArbitrageScanner::new(
            store,
            &config,
            Arc::new(move |opps: Vec<Opportunity>| {
                seen_clone.lock().extend(opps);
            }),
        );

        scanner.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        scanner.stop().await;

        assert!(!seen.lock().is_empty());
    }

    #[tokio::test]
    async fn start_stop_is_idempotent() {
        let store = Arc::new(PriceStore::new());
        let config = AppConfig::default();
        let scanner = ArbitrageScanner::new(store, &config, Arc::new(|_| {}));

        scanner.start().await;
        scanner.start().await;
        scanner.stop().await;
        scanner.stop().await;
    }
}
