//! Websocket transport implementing [`RpcClient`].
//!
//! One task owns the socket. Outbound commands are assigned monotonic ids and
//! parked in a pending map until the matching response arrives; frames with a
//! `method` instead of an `id` are forwarded as notifications.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::client::{CdpConnection, CdpConnector, CdpEvent, RpcClient, RpcError};
use crate::Cdp;

#[derive(Serialize)]
struct WireCommand<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct WireIncoming {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<WireError>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Deserialize)]
struct WireError {
    code: i64,
    message: String,
}

enum Outbound {
    Call {
        method: String,
        params: Value,
        reply: oneshot::Sender<Result<Value, RpcError>>,
    },
    Shutdown,
}

/// [`RpcClient`] over a websocket owned by a background pump task.
pub struct WebSocketRpcClient {
    tx: mpsc::UnboundedSender<Outbound>,
}

#[async_trait]
impl RpcClient for WebSocketRpcClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Outbound::Call {
                method: method.to_string(),
                params,
                reply: reply_tx,
            })
            .map_err(|_| RpcError::Closed)?;
        reply_rx.await.map_err(|_| RpcError::Closed)?
    }

    async fn close(&self) {
        let _ = self.tx.send(Outbound::Shutdown);
    }
}

/// Connects to a debuggable target's websocket endpoint.
pub struct WebSocketConnector;

#[async_trait]
impl CdpConnector for WebSocketConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        target_url: Option<&str>,
    ) -> Result<CdpConnection, RpcError> {
        let url = match target_url {
            Some(explicit) if explicit.starts_with("ws://") || explicit.starts_with("wss://") => {
                explicit.to_string()
            }
            Some(path) => format!("ws://{host}:{port}/{}", path.trim_start_matches('/')),
            None => format!("ws://{host}:{port}/"),
        };
        info!(%url, "connecting to CDP endpoint");

        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(stream, command_rx, event_tx));

        Ok(CdpConnection {
            cdp: Cdp::new(std::sync::Arc::new(WebSocketRpcClient { tx: command_tx })),
            events: event_rx,
        })
    }
}

async fn pump(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mut commands: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<CdpEvent>,
) {
    let (mut sink, mut source) = stream.split();
    let mut pending: HashMap<u64, oneshot::Sender<Result<Value, RpcError>>> = HashMap::new();
    let mut next_id: u64 = 0;

    loop {
        tokio::select! {
            outbound = commands.recv() => {
                match outbound {
                    Some(Outbound::Call { method, params, reply }) => {
                        next_id += 1;
                        let frame = WireCommand { id: next_id, method: &method, params };
                        let text = match serde_json::to_string(&frame) {
                            Ok(text) => text,
                            Err(e) => {
                                let _ = reply.send(Err(RpcError::Shape(e)));
                                continue;
                            }
                        };
                        debug!(id = next_id, %method, "-> CDP");
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            let _ = reply.send(Err(RpcError::Transport(e.to_string())));
                            break;
                        }
                        pending.insert(next_id, reply);
                    }
                    Some(Outbound::Shutdown) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            frame = source.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("CDP websocket closed by target");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "CDP websocket error");
                        break;
                    }
                };
                let incoming: WireIncoming = match serde_json::from_str(&text) {
                    Ok(incoming) => incoming,
                    Err(e) => {
                        warn!(error = %e, "unparseable CDP frame");
                        continue;
                    }
                };
                match incoming {
                    WireIncoming { id: Some(id), error: Some(err), .. } => {
                        if let Some(reply) = pending.remove(&id) {
                            let _ = reply.send(Err(RpcError::Remote {
                                code: err.code,
                                message: err.message,
                            }));
                        }
                    }
                    WireIncoming { id: Some(id), result, .. } => {
                        if let Some(reply) = pending.remove(&id) {
                            let _ = reply.send(Ok(result.unwrap_or(Value::Null)));
                        }
                    }
                    WireIncoming { method: Some(method), params, .. } => {
                        let delivered = events.send(CdpEvent {
                            method,
                            params: params.unwrap_or(Value::Null),
                        });
                        if delivered.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    // Fail anything still parked; the adapter maps Closed to session teardown.
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(RpcError::Closed));
    }
}
