//! WebSocket connection handling
//!
//! Each accepted socket gets a reader loop running in its own task and a
//! writer task that drains the connection's outbox into the socket.

use crate::error::{ClientRequestError, SignalingError};
use crate::outbox::Outbox;
use crate::router;
use crate::state::ServerState;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use signal_relay_protocol::{ConnectionId, JsonClientRequest, JsonServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tracing::{debug, info, warn};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// How long a disconnected client gets to take its remaining events
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Parse one incoming frame
///
/// Control frames yield `Ok(None)`.
pub fn parse_request(
    message: Result<Message, tungstenite::Error>,
) -> Result<Option<JsonClientRequest>, ClientRequestError> {
    let request = match message? {
        Message::Text(text) => text.as_str().parse::<JsonClientRequest>()?,
        Message::Close(_) => return Err(ClientRequestError::Close),
        Message::Binary(_) => return Err(ClientRequestError::UnsupportedType),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Ok(None),
    };
    Ok(Some(request))
}

/// Run a client connection from handshake to cleanup
pub async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    state: ServerState,
) -> Result<(), SignalingError> {
    // Any origin may connect
    let log_origin = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let origin = request
            .headers()
            .get("origin")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        debug!(%remote_addr, origin, path = request.uri().path(), "websocket handshake");
        Ok(response)
    };
    let socket = accept_hdr_async(stream, log_origin).await?;

    let (connection_id, outbox) = state.connect();
    info!(connection = %connection_id, %remote_addr, "client connected");

    let (sink, mut incoming) = socket.split();
    let writer = tokio::spawn(write_events(sink, outbox.clone(), connection_id));

    while let Some(message) = incoming.next().await {
        let request = match parse_request(message) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(ClientRequestError::Close) => break,
            Err(e) if e.is_recoverable() => {
                warn!(connection = %connection_id, "rejected request: {e}");
                report_error(&outbox, &e);
                continue;
            }
            Err(e) => {
                debug!(connection = %connection_id, "connection error: {e}");
                break;
            }
        };

        if let Err(e) = router::handle_request(&state, connection_id, request) {
            warn!(connection = %connection_id, "rejected request: {e}");
            report_error(&outbox, &e);
        }
    }

    router::handle_disconnect(&state, connection_id);
    info!(connection = %connection_id, %remote_addr, "client disconnected");

    finish_writer(writer, WRITER_GRACE, connection_id).await;
    Ok(())
}

/// Wait for the writer to flush, aborting it once `grace` runs out
///
/// Returns whether the writer finished on its own.
async fn finish_writer(
    mut writer: JoinHandle<()>,
    grace: Duration,
    connection_id: ConnectionId,
) -> bool {
    match tokio::time::timeout(grace, &mut writer).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(connection = %connection_id, "writer task failed: {e}");
            true
        }
        Err(_) => {
            debug!(connection = %connection_id, "client stopped reading, aborting writer");
            writer.abort();
            false
        }
    }
}

fn report_error(outbox: &Outbox, error: &ClientRequestError) {
    let event = JsonServerEvent::Error {
        message: error.to_string(),
    };
    outbox.push(event.to_string());
}

async fn write_events(mut sink: WsSink, outbox: Arc<Outbox>, connection_id: ConnectionId) {
    while let Some(events) = outbox.recv().await {
        for event in events {
            if let Err(e) = sink.feed(Message::text(event)).await {
                debug!(connection = %connection_id, "send failed: {e}");
                outbox.close();
                return;
            }
        }
        if let Err(e) = sink.flush().await {
            debug!(connection = %connection_id, "flush failed: {e}");
            outbox.close();
            return;
        }
    }
    let _ = sink.close().await;
}
