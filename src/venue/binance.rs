//! Binance spot adapter: all-tickers stream, no subscribe step, relies
//! on transport-level WebSocket pings for keepalive.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::Message;

use crate::config::{BINANCE_REST_EXCHANGE_INFO, BINANCE_WS_URL};
use crate::models::{Quote, Venue};
use crate::venue::VenueAdapter;

pub struct BinanceAdapter {
    http: reqwest::Client,
}

impl BinanceAdapter {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for BinanceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    #[serde(rename = "e")]
    event: Option<String>,
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "b")]
    bid_price: Option<String>,
    #[serde(rename = "B")]
    bid_qty: Option<String>,
    #[serde(rename = "a")]
    ask_price: Option<String>,
    #[serde(rename = "A")]
    ask_qty: Option<String>,
}

#[async_trait]
impl VenueAdapter for BinanceAdapter {
    fn venue(&self) -> Venue {
        Venue::Binance
    }

    fn ws_url(&self) -> &'static str {
        BINANCE_WS_URL
    }

    async fn fetch_symbols(&self) -> anyhow::Result<Vec<String>> {
        let info: ExchangeInfo = self
            .http
            .get(BINANCE_REST_EXCHANGE_INFO)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| s.symbol)
            .collect())
    }

    fn build_subscribe_messages(&self, _symbols: &[String]) -> Vec<Message> {
        // The stream URL already carries !ticker@arr; no subscribe frame needed.
        Vec::new()
    }

    fn decode(&self, frame: &Message) -> Result<Vec<Quote>, String> {
        let text = match frame {
            Message::Text(t) => t.as_str(),
            _ => return Ok(Vec::new()),
        };

        let tickers: Vec<Ticker> = match serde_json::from_str::<Vec<Ticker>>(text) {
            Ok(v) => v,
            Err(array_err) => match serde_json::from_str::<Ticker>(text) {
                Ok(t) => vec![t],
                Err(_) => return Err(array_err.to_string()),
            },
        };

        Ok(tickers
            .into_iter()
            .filter(|t| t.event.as_deref() == Some("24hrTicker"))
            .filter_map(|t| {
                let symbol = t.symbol?;
                let mut quote = Quote::new(Venue::Binance, symbol);
                quote.bid_price = t.bid_price.and_then(|v| v.parse().ok());
                quote.bid_qty = t.bid_qty.and_then(|v| v.parse().ok());
                quote.ask_price = t.ask_price.and_then(|v| v.parse().ok());
                quote.ask_qty = t.ask_qty.and_then(|v| v.parse().ok());
                Some(quote)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_ticker_object() {
        let adapter = BinanceAdapter::new();
        let frame = Message::Text(
            r#"{"e":"24hrTicker","s":"BTCUSDT","b":"30000.50","B":"1.2","a":"30010.25","A":"0.8"}"#
                .to_string(),
        );
        let quotes = adapter.decode(&frame).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTCUSDT");
        assert_eq!(quotes[0].bid_price, Some(30_000.50));
        assert_eq!(quotes[0].ask_price, Some(30_010.25));
    }

    #[test]
    fn decodes_ticker_array_and_skips_other_events() {
        let adapter = BinanceAdapter::new();
        let frame = Message::Text(
            r#"[{"e":"24hrTicker","s":"BTCUSDT","b":"1","B":"1","a":"2","A":"1"},{"e":"otherEvent","s":"ETHUSDT"}]"#
                .to_string(),
        );
        let quotes = adapter.decode(&frame).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTCUSDT");
    }

    #[test]
    fn subscribe_is_a_no_op() {
        let adapter = BinanceAdapter::new();
        assert!(adapter
            .build_subscribe_messages(&["BTCUSDT".to_string()])
            .is_empty());
    }

    #[test]
    fn non_text_frames_decode_to_nothing() {
        let adapter = BinanceAdapter::new();
        assert!(adapter
            .decode(&Message::Binary(vec![1, 2, 3]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let adapter = BinanceAdapter::new();
        let frame = Message::Text("{not valid json".to_string());
        assert!(adapter.decode(&frame).is_err());
    }
}
