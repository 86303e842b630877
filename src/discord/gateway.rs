//! Discord gateway: websocket session yielding message and interaction events.
//!
//! Same shape as a long-polling channel: `start()` spawns a background task
//! that owns the connection and feeds an unbounded queue, and hands back a
//! stream over that queue. Dropped connections are re-established with a
//! fresh IDENTIFY after a short delay; fatal close codes stop the task.

use std::pin::Pin;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::discord::types::{InboundMessage, Interaction, User};
use crate::error::ChannelError;

/// Gateway endpoint (API v10, JSON encoding).
pub const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Delay before reconnecting after a dropped session.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Gateway intents.
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_WEBHOOKS: u64 = 1 << 5;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    /// Privileged; must be enabled in the developer portal.
    pub const MESSAGE_CONTENT: u64 = 1 << 15;

    /// Everything the proxy bot needs.
    pub const PROXY_BOT: u64 = GUILDS | GUILD_WEBHOOKS | GUILD_MESSAGES | MESSAGE_CONTENT;
}

mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Close codes after which reconnecting cannot help.
const CLOSE_AUTHENTICATION_FAILED: u16 = 4004;
const CLOSE_INVALID_INTENTS: u16 = 4013;
const CLOSE_DISALLOWED_INTENTS: u16 = 4014;

/// Events the bot reacts to.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Session established; carries the bot's own account.
    Ready { user: User },
    MessageCreate(InboundMessage),
    InteractionCreate(Interaction),
}

/// Stream of gateway events.
pub type EventStream = Pin<Box<dyn Stream<Item = GatewayEvent> + Send>>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// A raw gateway frame.
#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadyData {
    user: User,
}

/// How a session ended.
enum SessionEnd {
    /// Reconnect after the delay.
    Reconnect,
    /// Stop for good.
    Fatal(ChannelError),
}

/// Discord gateway client.
pub struct Gateway {
    token: SecretString,
    intents: u64,
    url: String,
}

impl Gateway {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            intents: intents::PROXY_BOT,
            url: GATEWAY_URL.to_string(),
        }
    }

    /// Start the background session and return the event stream.
    pub fn start(&self) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let token = self.token.clone();
        let intents = self.intents;
        let url = self.url.clone();

        tokio::spawn(async move {
            tracing::info!(intents, "Discord gateway connecting...");
            loop {
                match run_session(&url, &token, intents, &tx).await {
                    SessionEnd::Reconnect if tx.is_closed() => {
                        tracing::info!("Gateway event stream closed");
                        return;
                    }
                    SessionEnd::Reconnect => {
                        tracing::warn!("Gateway session ended, reconnecting");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                    SessionEnd::Fatal(e) => {
                        tracing::error!(error = %e, "Gateway stopped");
                        if matches!(e, ChannelError::DisallowedIntents(_)) {
                            log_privileged_intent_hint();
                        }
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Box::pin(stream)
    }
}

/// Run one connection from HELLO until it drops.
async fn run_session(
    url: &str,
    token: &SecretString,
    intents: u64,
    tx: &UnboundedSender<GatewayEvent>,
) -> SessionEnd {
    let (ws, _) = match tokio_tungstenite::connect_async(url).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Gateway connect failed");
            return SessionEnd::Reconnect;
        }
    };
    let (mut sink, mut stream) = ws.split();

    let heartbeat_ms = match stream.next().await {
        Some(Ok(Message::Text(text))) => match parse_hello(text.as_str()) {
            Some(ms) => ms,
            None => {
                tracing::warn!("Gateway did not open with HELLO");
                return SessionEnd::Reconnect;
            }
        },
        other => {
            tracing::warn!(frame = ?other.map(|r| r.map(|m| m.len())), "Unexpected first gateway frame");
            return SessionEnd::Reconnect;
        }
    };

    if let Err(e) = send_json(&mut sink, &identify_payload(token, intents)).await {
        tracing::warn!(error = %e, "Failed to send IDENTIFY");
        return SessionEnd::Reconnect;
    }

    let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_ms));
    heartbeat.tick().await;
    let mut seq: Option<u64> = None;
    let mut acked = true;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !acked {
                    tracing::warn!("Heartbeat not acknowledged, dropping zombie connection");
                    return SessionEnd::Reconnect;
                }
                acked = false;
                if send_json(&mut sink, &heartbeat_payload(seq)).await.is_err() {
                    return SessionEnd::Reconnect;
                }
            }
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(close))) => {
                        let code = close.map(|c| u16::from(c.code)).unwrap_or(1000);
                        return close_code_outcome(code);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Gateway read error");
                        return SessionEnd::Reconnect;
                    }
                    None => return SessionEnd::Reconnect,
                };

                let payload: GatewayPayload = match serde_json::from_str(text.as_str()) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(error = %e, "Unparseable gateway frame");
                        continue;
                    }
                };
                if payload.s.is_some() {
                    seq = payload.s;
                }

                match payload.op {
                    opcode::DISPATCH => {
                        let Some(event) = decode_dispatch(payload.t.as_deref(), payload.d) else {
                            continue;
                        };
                        if tx.send(event).is_err() {
                            return SessionEnd::Reconnect;
                        }
                    }
                    opcode::HEARTBEAT => {
                        if send_json(&mut sink, &heartbeat_payload(seq)).await.is_err() {
                            return SessionEnd::Reconnect;
                        }
                    }
                    opcode::HEARTBEAT_ACK => acked = true,
                    opcode::RECONNECT | opcode::INVALID_SESSION => {
                        tracing::info!(op = payload.op, "Gateway asked us to reconnect");
                        return SessionEnd::Reconnect;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn send_json(sink: &mut WsSink, value: &serde_json::Value) -> Result<(), ChannelError> {
    sink.send(Message::Text(value.to_string().into()))
        .await
        .map_err(|e| ChannelError::Gateway(e.to_string()))
}

/// Heartbeat interval from a HELLO frame.
fn parse_hello(text: &str) -> Option<u64> {
    let payload: GatewayPayload = serde_json::from_str(text).ok()?;
    if payload.op != opcode::HELLO {
        return None;
    }
    payload.d.get("heartbeat_interval")?.as_u64()
}

fn identify_payload(token: &SecretString, intents: u64) -> serde_json::Value {
    serde_json::json!({
        "op": opcode::IDENTIFY,
        "d": {
            "token": token.expose_secret(),
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "plural-proxy",
                "device": "plural-proxy"
            },
            "presence": {
                "activities": [{ "name": "with plural systems", "type": 0 }],
                "status": "online",
                "since": null,
                "afk": false
            }
        }
    })
}

fn heartbeat_payload(seq: Option<u64>) -> serde_json::Value {
    serde_json::json!({ "op": opcode::HEARTBEAT, "d": seq })
}

/// Map a dispatch frame to an event the bot handles.
fn decode_dispatch(kind: Option<&str>, data: serde_json::Value) -> Option<GatewayEvent> {
    let decoded = match kind? {
        "READY" => serde_json::from_value::<ReadyData>(data)
            .map(|r| GatewayEvent::Ready { user: r.user }),
        "MESSAGE_CREATE" => serde_json::from_value(data).map(GatewayEvent::MessageCreate),
        "INTERACTION_CREATE" => serde_json::from_value(data).map(GatewayEvent::InteractionCreate),
        _ => return None,
    };
    decoded
        .inspect_err(|e| tracing::warn!(event = kind, error = %e, "Failed to decode dispatch"))
        .ok()
}

fn close_code_outcome(code: u16) -> SessionEnd {
    match code {
        CLOSE_AUTHENTICATION_FAILED => SessionEnd::Fatal(ChannelError::Gateway(
            "authentication failed, check BOT_TOKEN".into(),
        )),
        CLOSE_INVALID_INTENTS | CLOSE_DISALLOWED_INTENTS => {
            SessionEnd::Fatal(ChannelError::DisallowedIntents(code))
        }
        _ => {
            tracing::info!(code, "Gateway closed the connection");
            SessionEnd::Reconnect
        }
    }
}

fn log_privileged_intent_hint() {
    tracing::error!(
        "PRIVILEGED INTENTS NOT ENABLED: enable MESSAGE CONTENT INTENT for this bot under \
         Bot > Privileged Gateway Intents at https://discord.com/developers/applications"
    );
}
