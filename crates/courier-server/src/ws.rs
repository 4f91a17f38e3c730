//! WebSocket transport.
//!
//! Each socket is split into a reader, which feeds a [`ConnectionLifecycle`],
//! and a writer task that owns the sink and drains the connection's outbound
//! queue. The writer also sends keepalive pings; the reader gives up on a
//! socket that has been silent for longer than the idle timeout.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, warn};

use courier_shared::constants::MAX_FRAME_SIZE;

use crate::api::AppState;
use crate::connection::{Connection, EventReceiver};
use crate::hub::Hub;
use crate::lifecycle::ConnectionLifecycle;

/// GET /ws
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    let ping_interval = state.config.ping_interval;
    let idle_timeout = state.config.idle_timeout;

    ws.max_message_size(MAX_FRAME_SIZE)
        .max_frame_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| run_connection(socket, hub, ping_interval, idle_timeout))
}

/// Drive one socket until the client leaves or goes silent.
pub async fn run_connection(
    socket: WebSocket,
    hub: Arc<Hub>,
    ping_interval: Duration,
    idle_timeout: Duration,
) {
    let (sink, stream) = socket.split();
    let (conn, rx) = Connection::channel();
    let conn_id = conn.id();

    let writer = tokio::spawn(writer_task(sink, rx, ping_interval));

    let mut lifecycle = ConnectionLifecycle::new(hub, conn);
    reader_loop(stream, &mut lifecycle, idle_timeout).await;
    lifecycle.close();

    writer.abort();
    debug!(conn = %conn_id, "Connection task finished");
}

async fn reader_loop(
    mut stream: SplitStream<WebSocket>,
    lifecycle: &mut ConnectionLifecycle,
    idle_timeout: Duration,
) {
    let conn_id = lifecycle.connection().id();

    loop {
        let frame = match timeout(idle_timeout, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!(conn = %conn_id, error = %e, "Socket read error");
                return;
            }
            Ok(None) => return,
            Err(_) => {
                debug!(conn = %conn_id, timeout = ?idle_timeout, "Socket idle, closing");
                return;
            }
        };

        match frame {
            Message::Text(text) => lifecycle.handle_text(&text).await,
            Message::Binary(data) => {
                warn!(conn = %conn_id, len = data.len(), "Ignoring binary frame");
            }
            Message::Close(_) => return,
            // Pings are answered by axum; both just prove liveness.
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

async fn writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: EventReceiver,
    ping_interval: Duration,
) {
    let mut ping = interval(ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately.
    ping.tick().await;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(event = event.name(), error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}
