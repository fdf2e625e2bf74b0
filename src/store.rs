//! Concurrent store of the latest quote per (venue, symbol), and the
//! cross-venue scan that turns a snapshot of it into opportunities.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::config::MAX_ACCEPTABLE_PROFIT_PERCENT;
use crate::models::{Opportunity, Quote, Symbol, Venue};

/// Thread-safe (venue, symbol) -> latest quote map.
///
/// Readers and writers may run concurrently; `update` only ever holds
/// the write lock long enough to upsert a single entry, and
/// `find_opportunities` takes one read-lock acquisition to clone the
/// quotes it needs before releasing it, so it never blocks writers for
/// longer than a single clone.
#[derive(Default)]
pub struct PriceStore {
    quotes: RwLock<HashMap<(Venue, Symbol), Quote>>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
        }
    }

    /// Upsert the latest quote for its (venue, symbol) key. The stored
    /// timestamp is always the store's own clock, not the caller's.
    pub fn update(&self, mut quote: Quote) {
        quote.timestamp = Utc::now();
        let key = (quote.venue, quote.symbol.clone());
        self.quotes.write().insert(key, quote);
    }

    pub fn get(&self, venue: Venue, symbol: &str) -> Option<Quote> {
        self.quotes
            .read()
            .get(&(venue, symbol.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.read().is_empty()
    }

    /// Snapshot-scan for cross-venue opportunities.
    ///
    /// `min_profit_percent` is a fraction (0.001 == 0.1%), not a
    /// percent; the upper bound `MAX_ACCEPTABLE_PROFIT_PERCENT` guards
    /// against spreads usually explained by stale or one-sided books.
    pub fn find_opportunities(
        &self,
        min_profit_percent: f64,
        max_data_age_seconds: u64,
    ) -> Vec<Opportunity> {
        let now = Utc::now();
        let max_age = max_data_age_seconds as f64;

        let fresh: Vec<Quote> = {
            let quotes = self.quotes.read();
            quotes
                .values()
                .filter(|q| q.is_complete() && q.age_seconds(now) <= max_age)
                .cloned()
                .collect()
        };

        let mut by_symbol: HashMap<&str, Vec<&Quote>> = HashMap::new();
        for q in &fresh {
            by_symbol.entry(q.symbol.as_str()).or_default().push(q);
        }

        let mut opportunities = Vec::new();
        for group in by_symbol.values() {
            if group.len() < 2 {
                continue;
            }
            for buy in group.iter() {
                for sell in group.iter() {
                    if buy.venue == sell.venue {
                        continue;
                    }
                    let (Some(buy_ask), Some(sell_bid)) = (buy.ask_price, sell.bid_price) else {
                        continue;
                    };
                    if buy_ask <= 0.0 {
                        continue;
                    }
                    let profit = (sell_bid - buy_ask) / buy_ask;
                    if profit >= min_profit_percent && profit < MAX_ACCEPTABLE_PROFIT_PERCENT {
                        opportunities.push(Opportunity {
                            symbol: buy.symbol.clone(),
                            buy_venue: buy.venue,
                            buy_price: buy_ask,
                            sell_venue: sell.venue,
                            sell_price: sell_bid,
                            profit_percent: profit * 100.0,
                            buy_timestamp: buy.timestamp,
                            sell_timestamp: sell.timestamp,
                            buy_age_seconds: buy.age_seconds(now),
                            sell_age_seconds: sell.age_seconds(now),
                        });
                    }
                }
            }
        }

        opportunities.sort_by(|a, b| {
            (a.symbol.as_str(), a.buy_venue.as_str(), a.sell_venue.as_str()).cmp(&(
                b.symbol.as_str(),
                b.buy_venue.as_str(),
                b.sell_venue.as_str(),
            ))
        });
        opportunities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn quote(venue: Venue, symbol: &str, bid: f64, ask: f64) -> Quote {
        Quote {
            venue,
            symbol: symbol.to_string(),
            bid_price: Some(bid),
            bid_qty: Some(1.0),
            ask_price: Some(ask),
            ask_qty: Some(1.0),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn single_opportunity_is_found() {
        let store = PriceStore::new();
        store.update(quote(Venue::Binance, "BTCUSDT", 30_000.0, 30_010.0));
        store.update(quote(Venue::Bybit, "BTCUSDT", 30_100.0, 30_110.0));

        let opps = store.find_opportunities(0.001, 60);
        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.buy_venue, Venue::Binance);
        assert_eq!(opp.sell_venue, Venue::Bybit);
        assert_eq!(opp.buy_price, 30_010.0);
        assert_eq!(opp.sell_price, 30_100.0);
        assert!((opp.profit_percent - 0.2998_9).abs() < 0.01);
    }

    #[test]
    fn stale_quote_is_filtered_out() {
        let store = PriceStore::new();
        store.update(quote(Venue::Binance, "BTCUSDT", 30_000.0, 30_010.0));

        // `update` always stamps the store's own clock, so back-date the
        // entry directly to exercise the freshness filter.
        let stale = Quote {
            timestamp: Utc::now() - Duration::seconds(120),
            ..quote(Venue::Bybit, "BTCUSDT", 30_100.0, 30_110.0)
        };
        store
            .quotes
            .write()
            .insert((stale.venue, stale.symbol.clone()), stale);

        let opps = store.find_opportunities(0.001, 60);
        assert!(opps.is_empty());
    }

    #[test]
    fn same_venue_pair_is_never_emitted() {
        let store = PriceStore::new();
        store.update(quote(Venue::Binance, "BTCUSDT", 30_000.0, 30_010.0));
        store.update(quote(Venue::Binance, "BTCUSDT", 30_100.0, 30_110.0));

        let opps = store.find_opportunities(0.0, 60);
        assert!(opps.is_empty());
    }

    #[test]
    fn profit_above_cap_is_suppressed() {
        let store = PriceStore::new();
        store.update(quote(Venue::Binance, "BTCUSDT", 0.0, 1.0));
        store.update(quote(Venue::Bybit, "BTCUSDT", 2.0, 2.0));

        let opps = store.find_opportunities(0.0, 60);
        assert!(opps.is_empty());
    }

    #[test]
    fn incomplete_quote_is_excluded() {
        let store = PriceStore::new();
        let mut partial = quote(Venue::Binance, "BTCUSDT", 30_000.0, 30_010.0);
        partial.ask_price = None;
        store.update(partial);
        store.update(quote(Venue::Bybit, "BTCUSDT", 30_100.0, 30_110.0));

        let opps = store.find_opportunities(0.0, 60);
        assert!(opps.is_empty());
    }

    #[test]
    fn get_returns_latest_value_per_key() {
        let store = PriceStore::new();
        store.update(quote(Venue::Binance, "BTCUSDT", 1.0, 2.0));
        store.update(quote(Venue::Binance, "BTCUSDT", 3.0, 4.0));

        let q = store.get(Venue::Binance, "BTCUSDT").unwrap();
        assert_eq!(q.bid_price, Some(3.0));
        assert_eq!(store.get(Venue::Bybit, "BTCUSDT"), None);
    }
}
