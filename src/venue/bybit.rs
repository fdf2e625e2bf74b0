//! Bybit spot adapter: JSON op/args subscribe protocol, app-level
//! ping/pong, chunked subscriptions.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::config::{BYBIT_REST_INSTRUMENTS, BYBIT_WS_URL, MAX_ARGS_PER_MESSAGE};
use crate::models::{Quote, Venue};
use crate::venue::VenueAdapter;

pub struct BybitAdapter {
    http: reqwest::Client,
}

impl BybitAdapter {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for BybitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct InstrumentsResponse {
    result: InstrumentsResult,
}

#[derive(Debug, Deserialize)]
struct InstrumentsResult {
    list: Vec<Instrument>,
}

#[derive(Debug, Deserialize)]
struct Instrument {
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct OrderbookMessage {
    topic: Option<String>,
    data: Option<OrderbookData>,
}

#[derive(Debug, Deserialize)]
struct OrderbookData {
    s: String,
    #[serde(default)]
    b: Vec<[String; 2]>,
    #[serde(default)]
    a: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct AckMessage {
    op: Option<String>,
    success: Option<bool>,
    ret_msg: Option<String>,
}

fn message_text(frame: &Message) -> Option<&str> {
    match frame {
        Message::Text(t) => Some(t.as_str()),
        _ => None,
    }
}

#[async_trait]
impl VenueAdapter for BybitAdapter {
    fn venue(&self) -> Venue {
        Venue::Bybit
    }

    fn ws_url(&self) -> &'static str {
        BYBIT_WS_URL
    }

    async fn fetch_symbols(&self) -> anyhow::Result<Vec<String>> {
        let resp: InstrumentsResponse = self
            .http
            .get(BYBIT_REST_INSTRUMENTS)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp
            .result
            .list
            .into_iter()
            .filter(|i| i.status == "Trading")
            .map(|i| i.symbol)
            .collect())
    }

    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Message> {
        symbols
            .chunks(MAX_ARGS_PER_MESSAGE)
            .map(|chunk| {
                let args: Vec<String> = chunk
                    .iter()
                    .map(|s| format!("orderbook.1.{s}"))
                    .collect();
                Message::Text(json!({ "op": "subscribe", "args": args }).to_string())
            })
            .collect()
    }

    fn client_ping_frame(&self) -> Option<Message> {
        Some(Message::Text(json!({ "op": "ping" }).to_string()))
    }

    fn handle_server_ping(&self, frame: &Message) -> Option<Message> {
        let text = message_text(frame)?;
        if text.contains("\"op\":\"ping\"") {
            Some(Message::Text(json!({ "op": "pong" }).to_string()))
        } else {
            None
        }
    }

    fn is_pong(&self, frame: &Message) -> bool {
        message_text(frame)
            .map(|t| t.contains("\"op\":\"pong\""))
            .unwrap_or(false)
    }

    /// A `{"op":"subscribe","success":false,"ret_msg":"..."}` ack.
    fn check_nack(&self, frame: &Message) -> Option<String> {
        let text = message_text(frame)?;
        let ack: AckMessage = serde_json::from_str(text).ok()?;
        if ack.op.as_deref() != Some("subscribe") {
            return None;
        }
        if ack.success.unwrap_or(true) {
            return None;
        }
        Some(format!(
            "subscribe error: {}",
            ack.ret_msg.unwrap_or_default()
        ))
    }

    fn decode(&self, frame: &Message) -> Result<Vec<Quote>, String> {
        let Some(text) = message_text(frame) else {
            return Ok(Vec::new());
        };
        let msg: OrderbookMessage = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let Some(topic) = msg.topic else {
            return Ok(Vec::new());
        };
        if !topic.starts_with("orderbook.") {
            return Ok(Vec::new());
        }
        let Some(data) = msg.data else {
            return Ok(Vec::new());
        };

        let mut quote = Quote::new(Venue::Bybit, data.s);
        if let Some([price, qty]) = data.b.first() {
            quote.bid_price = price.parse().ok();
            quote.bid_qty = qty.parse().ok();
        }
        if let Some([price, qty]) = data.a.first() {
            quote.ask_price = price.parse().ok();
            quote.ask_qty = qty.parse().ok();
        }

        if quote.bid_price.is_some() && quote.ask_price.is_some() {
            Ok(vec![quote])
        } else {
            Ok(Vec::new())
        }
    }
}
