//! 中继通信
//!
//! 客户端消息：`REQ` / `EVENT` / `CLOSE`
//! 中继消息：`EVENT` / `EOSE` / `OK` / `NOTICE` / `CLOSED`

use crate::error::{Error, Result};
use crate::event::{Event, Filter};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

/// 客户端发往中继的消息
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Req { subscription_id: String, filter: Filter },
    Event(Event),
    Close { subscription_id: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String> {
        let value = match self {
            ClientMessage::Req { subscription_id, filter } => {
                serde_json::json!(["REQ", subscription_id, filter])
            }
            ClientMessage::Event(event) => serde_json::json!(["EVENT", event]),
            ClientMessage::Close { subscription_id } => serde_json::json!(["CLOSE", subscription_id]),
        };
        Ok(serde_json::to_string(&value)?)
    }

    /// 解析客户端消息（测试用中继需要）
    pub fn parse(text: &str) -> Result<Option<Self>> {
        let items = parse_array(text)?;
        let msg = match items.first().and_then(Value::as_str) {
            Some("REQ") => ClientMessage::Req {
                subscription_id: string_at(&items, 1)?,
                filter: serde_json::from_value(items.get(2).cloned().unwrap_or(Value::Null))?,
            },
            Some("EVENT") => {
                ClientMessage::Event(serde_json::from_value(items.get(1).cloned().unwrap_or(Value::Null))?)
            }
            Some("CLOSE") => ClientMessage::Close {
                subscription_id: string_at(&items, 1)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }
}

/// 中继发往客户端的消息
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event { subscription_id: String, event: Event },
    Eose { subscription_id: String },
    Ok { event_id: String, accepted: bool, message: String },
    Notice { message: String },
    Closed { subscription_id: String, message: String },
}

impl RelayMessage {
    /// 解析中继消息，未知类型返回 `None`
    pub fn parse(text: &str) -> Result<Option<Self>> {
        let items = parse_array(text)?;
        let msg = match items.first().and_then(Value::as_str) {
            Some("EVENT") => RelayMessage::Event {
                subscription_id: string_at(&items, 1)?,
                event: serde_json::from_value(items.get(2).cloned().unwrap_or(Value::Null))?,
            },
            Some("EOSE") => RelayMessage::Eose {
                subscription_id: string_at(&items, 1)?,
            },
            Some("OK") => RelayMessage::Ok {
                event_id: string_at(&items, 1)?,
                accepted: items.get(2).and_then(Value::as_bool).unwrap_or(false),
                message: string_at(&items, 3).unwrap_or_default(),
            },
            Some("NOTICE") => RelayMessage::Notice {
                message: string_at(&items, 1).unwrap_or_default(),
            },
            Some("CLOSED") => RelayMessage::Closed {
                subscription_id: string_at(&items, 1)?,
                message: string_at(&items, 2).unwrap_or_default(),
            },
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }

    pub fn to_json(&self) -> Result<String> {
        let value = match self {
            RelayMessage::Event { subscription_id, event } => serde_json::json!(["EVENT", subscription_id, event]),
            RelayMessage::Eose { subscription_id } => serde_json::json!(["EOSE", subscription_id]),
            RelayMessage::Ok { event_id, accepted, message } => {
                serde_json::json!(["OK", event_id, accepted, message])
            }
            RelayMessage::Notice { message } => serde_json::json!(["NOTICE", message]),
            RelayMessage::Closed { subscription_id, message } => {
                serde_json::json!(["CLOSED", subscription_id, message])
            }
        };
        Ok(serde_json::to_string(&value)?)
    }
}

fn parse_array(text: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => Ok(items),
        _ => Err(Error::Encoding("relay message is not a JSON array".to_string())),
    }
}

fn string_at(items: &[Value], index: usize) -> Result<String> {
    items
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Encoding(format!("missing string at position {}", index)))
}

/// 中继对发布事件的确认
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub accepted: bool,
    pub message: String,
}

/// 单个中继的传输层
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// 发送 REQ，收集事件直到 EOSE
    async fn query(&self, relay: &str, filter: &Filter) -> Result<Vec<Event>>;

    /// 发送 EVENT，等待对应的 OK
    async fn publish(&self, relay: &str, event: &Event) -> Result<Ack>;
}

/// 基于 WebSocket 的传输层，每次调用建立一个新连接
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

fn subscription_id() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

#[async_trait]
impl RelayTransport for WsTransport {
    async fn query(&self, relay: &str, filter: &Filter) -> Result<Vec<Event>> {
        let (mut ws, _) = connect_async(relay)
            .await
            .map_err(|e| Error::relay(relay, format!("connect failed: {}", e)))?;

        let sub_id = subscription_id();
        let req = ClientMessage::Req {
            subscription_id: sub_id.clone(),
            filter: filter.clone(),
        };
        ws.send(Message::Text(req.to_json()?.into()))
            .await
            .map_err(|e| Error::relay(relay, e.to_string()))?;

        let mut events = Vec::new();
        let mut eose = false;
        while let Some(frame) = ws.next().await {
            let frame = frame.map_err(|e| Error::relay(relay, e.to_string()))?;
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match RelayMessage::parse(text.as_str()) {
                Ok(Some(RelayMessage::Event { subscription_id, event })) if subscription_id == sub_id => {
                    events.push(event);
                }
                Ok(Some(RelayMessage::Eose { subscription_id })) if subscription_id == sub_id => {
                    eose = true;
                    break;
                }
                Ok(Some(RelayMessage::Closed { subscription_id, message })) if subscription_id == sub_id => {
                    return Err(Error::relay(relay, format!("subscription closed: {}", message)));
                }
                Ok(Some(RelayMessage::Notice { message })) => debug!("NOTICE from {}: {}", relay, message),
                Ok(_) => {}
                Err(e) => debug!("Ignoring malformed message from {}: {}", relay, e),
            }
        }

        if !eose {
            return Err(Error::relay(relay, "connection closed before EOSE"));
        }

        let close = ClientMessage::Close { subscription_id: sub_id };
        let _ = ws.send(Message::Text(close.to_json()?.into())).await;
        let _ = ws.close(None).await;

        debug!("Received {} events from {}", events.len(), relay);
        Ok(events)
    }

    async fn publish(&self, relay: &str, event: &Event) -> Result<Ack> {
        let (mut ws, _) = connect_async(relay)
            .await
            .map_err(|e| Error::relay(relay, format!("connect failed: {}", e)))?;

        ws.send(Message::Text(ClientMessage::Event(event.clone()).to_json()?.into()))
            .await
            .map_err(|e| Error::relay(relay, e.to_string()))?;

        while let Some(frame) = ws.next().await {
            let frame = frame.map_err(|e| Error::relay(relay, e.to_string()))?;
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match RelayMessage::parse(text.as_str()) {
                Ok(Some(RelayMessage::Ok { event_id, accepted, message })) if event_id == event.id => {
                    let _ = ws.close(None).await;
                    return Ok(Ack { accepted, message });
                }
                Ok(Some(RelayMessage::Notice { message })) => debug!("NOTICE from {}: {}", relay, message),
                Ok(_) => {}
                Err(e) => debug!("Ignoring malformed message from {}: {}", relay, e),
            }
        }

        Err(Error::relay(relay, "connection closed before OK"))
    }
}
