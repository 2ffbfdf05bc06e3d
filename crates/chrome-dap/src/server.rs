//! DAP framing over a byte stream.
//!
//! Reads `Content-Length`-framed requests, hands them to the adapter and
//! writes back responses and events, each wrapped with the `seq`/`type`
//! fields the protocol requires. The completion token of a resume-inducing
//! request is fired only after its response bytes are flushed, which is what
//! lets the adapter hold `Stopped` until the editor has seen the response.

use std::sync::Arc;

use chrome_cdp::transport::WebSocketConnector;
use chrome_dap_core::transformers::{DirectPathTransformer, DisabledSourceMaps};
use chrome_dap_core::ChromeDebugAdapter;
use dap::events::Event;
use dap::prelude::*;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, trace};

/// Wrapper that adds seq and type fields required by DAP protocol
#[derive(Serialize)]
struct ProtocolMessage<T> {
    seq: i64,
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(flatten)]
    body: T,
}

pub struct DapServer {
    adapter: Arc<ChromeDebugAdapter>,
    event_rx: mpsc::Receiver<Event>,
    seq_number: Arc<Mutex<i64>>,
}

impl DapServer {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(100);
        let adapter = ChromeDebugAdapter::new(
            Arc::new(WebSocketConnector),
            event_tx,
            Box::new(DisabledSourceMaps),
            Box::new(DirectPathTransformer),
        );
        Self {
            adapter,
            event_rx,
            seq_number: Arc::new(Mutex::new(0)),
        }
    }

    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<(), Box<dyn std::error::Error>>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);
        let writer = Arc::new(Mutex::new(BufWriter::new(writer)));

        let writer_clone = writer.clone();
        let seq_clone = self.seq_number.clone();
        let mut event_rx = self.event_rx;
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                debug!(?event, "sending event");
                let mut seq = seq_clone.lock().await;
                *seq += 1;
                let wrapped = ProtocolMessage {
                    seq: *seq,
                    msg_type: "event".to_string(),
                    body: event,
                };
                drop(seq);

                match serde_json::to_string(&wrapped) {
                    Ok(event_json) => {
                        let mut w = writer_clone.lock().await;
                        if let Err(e) = write_framed(&mut *w, &event_json).await {
                            error!(error = %e, "failed to write DAP event");
                            break;
                        }
                    }
                    Err(e) => error!(error = %e, "failed to serialize DAP event"),
                }
            }
        });

        loop {
            let mut line = String::new();
            trace!("waiting for next message");
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF received, shutting down");
                    break;
                }
                Ok(_) => {
                    if !line.starts_with("Content-Length:") {
                        continue;
                    }
                    let length: usize =
                        line.trim_start_matches("Content-Length:").trim().parse()?;

                    // Skip empty line
                    line.clear();
                    reader.read_line(&mut line).await?;

                    let mut body = vec![0u8; length];
                    reader.read_exact(&mut body).await?;

                    let request_str = String::from_utf8(body)?;
                    debug!(request = %request_str, "received request");
                    let request: Request = serde_json::from_str(&request_str)?;

                    let handled = self.adapter.handle_request(request).await;

                    let mut seq = self.seq_number.lock().await;
                    *seq += 1;
                    let wrapped = ProtocolMessage {
                        seq: *seq,
                        msg_type: "response".to_string(),
                        body: handled.response,
                    };
                    drop(seq);

                    let response_json = serde_json::to_string(&wrapped)?;
                    {
                        let mut w = writer.lock().await;
                        if let Err(e) = write_framed(&mut *w, &response_json).await {
                            error!(error = %e, "failed to write DAP response");
                            break;
                        }
                    }

                    // Response is on the wire; a pending Stopped may go out.
                    if let Some(ack) = handled.ack {
                        let _ = ack.send(());
                    }
                }
                Err(e) => {
                    error!(error = %e, "DAP server error");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn write_framed<W>(writer: &mut W, json: &str) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let output = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
    writer.write_all(output.as_bytes()).await?;
    writer.flush().await
}
