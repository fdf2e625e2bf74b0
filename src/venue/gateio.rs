//! Gate.io spot adapter: `spot.book_ticker` channel, app-level
//! `spot.ping`/`spot.pong`, underscore-stripped symbol normalization.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::config::{GATEIO_REST_CURRENCY_PAIRS, GATEIO_WS_URL, MAX_ARGS_PER_MESSAGE};
use crate::models::{Quote, Venue};
use crate::venue::VenueAdapter;

pub struct GateioAdapter {
    http: reqwest::Client,
}

impl GateioAdapter {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for GateioAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct CurrencyPair {
    id: String,
    trade_status: String,
}

#[derive(Debug, Deserialize)]
struct GateioMessage {
    channel: Option<String>,
    event: Option<String>,
    result: Option<BookTickerResult>,
}

#[derive(Debug, Deserialize)]
struct BookTickerResult {
    s: String,
    b: Option<String>,
    #[serde(rename = "B")]
    bid_qty: Option<String>,
    a: Option<String>,
    #[serde(rename = "A")]
    ask_qty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscribeAck {
    event: Option<String>,
    error: Option<serde_json::Value>,
    result: Option<SubscribeAckResult>,
}

#[derive(Debug, Deserialize)]
struct SubscribeAckResult {
    status: Option<String>,
}

fn message_text(frame: &Message) -> Option<&str> {
    match frame {
        Message::Text(t) => Some(t.as_str()),
        _ => None,
    }
}

/// `BTC_USDT` -> `BTCUSDT`.
fn normalize_symbol(raw: &str) -> String {
    raw.replace('_', "")
}

#[async_trait]
impl VenueAdapter for GateioAdapter {
    fn venue(&self) -> Venue {
        Venue::Gateio
    }

    fn ws_url(&self) -> &'static str {
        GATEIO_WS_URL
    }

    async fn fetch_symbols(&self) -> anyhow::Result<Vec<String>> {
        let pairs: Vec<CurrencyPair> = self
            .http
            .get(GATEIO_REST_CURRENCY_PAIRS)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(pairs
            .into_iter()
            .filter(|p| p.trade_status == "tradable")
            .map(|p| p.id)
            .collect())
    }

    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Message> {
        symbols
            .chunks(MAX_ARGS_PER_MESSAGE)
            .map(|chunk| {
                Message::Text(
                    json!({
                        "time": Utc::now().timestamp(),
                        "channel": "spot.book_ticker",
                        "event": "subscribe",
                        "payload": chunk,
                    })
                    .to_string(),
                )
            })
            .collect()
    }

    fn client_ping_frame(&self) -> Option<Message> {
        Some(Message::Text(json!({ "channel": "spot.ping" }).to_string()))
    }

    fn handle_server_ping(&self, frame: &Message) -> Option<Message> {
        let text = message_text(frame)?;
        if text.contains("\"channel\":\"spot.ping\"") {
            Some(Message::Text(
                json!({ "channel": "spot.pong" }).to_string(),
            ))
        } else {
            None
        }
    }

    fn is_pong(&self, frame: &Message) -> bool {
        message_text(frame)
            .map(|t| t.contains("\"channel\":\"spot.pong\""))
            .unwrap_or(false)
    }

    /// A `{"event":"subscribe","result":{"status":"..."}}` ack whose
    /// status isn't `"success"`.
    fn check_nack(&self, frame: &Message) -> Option<String> {
        let text = message_text(frame)?;
        let ack: SubscribeAck = serde_json::from_str(text).ok()?;
        if ack.event.as_deref() != Some("subscribe") {
            return None;
        }
        let status = ack.result.and_then(|r| r.status);
        if status.as_deref() == Some("success") {
            return None;
        }
        let error = ack
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        Some(format!("subscribe error: {error}"))
    }

    fn decode(&self, frame: &Message) -> Result<Vec<Quote>, String> {
        let Some(text) = message_text(frame) else {
            return Ok(Vec::new());
        };
        let msg: GateioMessage = serde_json::from_str(text).map_err(|e| e.to_string())?;
        if msg.event.as_deref() != Some("update") {
            return Ok(Vec::new());
        }
        if !msg.channel.as_deref().unwrap_or("").contains("book_ticker") {
            return Ok(Vec::new());
        }
        let Some(result) = msg.result else {
            return Ok(Vec::new());
        };

        let mut quote = Quote::new(Venue::Gateio, normalize_symbol(&result.s));
        quote.bid_price = result.b.and_then(|v| v.parse().ok());
        quote.bid_qty = result.bid_qty.and_then(|v| v.parse().ok());
        quote.ask_price = result.a.and_then(|v| v.parse().ok());
        quote.ask_qty = result.ask_qty.and_then(|v| v.parse().ok());

        if quote.bid_price.is_some() && quote.ask_price.is_some() {
            Ok(vec![quote])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_underscore_from_symbol() {
        assert_eq!(normalize_symbol("BTC_USDT"), "BTCUSDT");
    }

    #[test]
    fn decodes_book_ticker_update() {
        let adapter = GateioAdapter::new();
        let frame = Message::Text(
            r#"{"time":1,"channel":"spot.book_ticker","event":"update","result":{"t":1,"u":1,"s":"BTC_USDT","b":"30000","B":"1.2","a":"30010","A":"0.8"}}"#
                .to_string(),
        );
        let quotes = adapter.decode(&frame).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTCUSDT");
        assert_eq!(quotes[0].bid_price, Some(30_000.0));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let adapter = GateioAdapter::new();
        let frame = Message::Text("{broken".to_string());
        assert!(adapter.decode(&frame).is_err());
    }

    #[test]
    fn ping_pong_detection() {
        let adapter = GateioAdapter::new();
        let ping = Message::Text(r#"{"channel":"spot.ping"}"#.to_string());
        let pong = Message::Text(r#"{"channel":"spot.pong"}"#.to_string());
        assert!(adapter.handle_server_ping(&ping).is_some());
        assert!(adapter.is_pong(&pong));
    }

    #[test]
    fn detects_subscribe_nack() {
        let adapter = GateioAdapter::new();
        let nack = Message::Text(
            r#"{"event":"subscribe","error":"invalid payload","result":{"status":"fail"}}"#
                .to_string(),
        );
        let ack = Message::Text(
            r#"{"event":"subscribe","result":{"status":"success"}}"#.to_string(),
        );
        assert_eq!(
            adapter.check_nack(&nack),
            Some("subscribe error: \"invalid payload\"".to_string())
        );
        assert_eq!(adapter.check_nack(&ack), None);
    }

    #[test]
    fn subscribe_chunks_at_ten_symbols() {
        let adapter = GateioAdapter::new();
        let symbols: Vec<String> = (0..22).map(|i| format!("SYM{i}_USDT")).collect();
        let messages = adapter.build_subscribe_messages(&symbols);
        assert_eq!(messages.len(), 3);
    }
}
