//! WebSocket server
//!
//! Accepts connections, performs the WebSocket handshake, and drives one
//! session per connection:
//! - the reader loop enforces the 60 s read deadline (reset by any inbound
//!   frame, keepalives included) and dispatches frames to the session;
//! - the writer loop drains the session queue with a 10 s per-frame write
//!   deadline and emits a transport keepalive every 54 s, tuned below the
//!   peer's read deadline.
//!
//! Shutdown: cancelling the server token stops the accept loop and flips
//! every session to Closing; `serve` returns once all sessions have wound
//! down (the caller bounds the wait).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, Receiver};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async_with_config, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tungstenite::protocol::{Message as WsMessage, WebSocketConfig};
use tracing::{debug, info, warn};

use hubbub_broker::{Broker, ServerFrame};
use hubbub_config::Settings;

use crate::index::SessionIndex;
use crate::session::{Session, SESSION_QUEUE_CAPACITY};

/// A session with no inbound traffic at all is dropped after this long.
pub const READ_DEADLINE: Duration = Duration::from_secs(60);
/// Per-frame write deadline.
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);
/// Keepalive ping interval, tuned below the peer's read deadline.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(54);

/// Run the streaming surface on an already-bound listener until `shutdown`
/// is cancelled, then wait for the remaining sessions to close.
pub async fn serve(
    listener: TcpListener,
    broker: Arc<Broker>,
    index: Arc<SessionIndex>,
    settings: Settings,
    shutdown: CancellationToken,
) {
    match listener.local_addr() {
        Ok(addr) => info!(addr = %addr, "websocket server listening"),
        Err(_) => info!("websocket server listening"),
    }

    let tracker = TaskTracker::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let broker = Arc::clone(&broker);
                    let index = Arc::clone(&index);
                    let settings = settings.clone();
                    let stop = shutdown.child_token();
                    tracker.spawn(async move {
                        handle_connection(stream, peer, broker, index, settings, stop).await;
                    });
                }
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                }
            },
        }
    }

    tracker.close();
    tracker.wait().await;
    info!("websocket server stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Broker>,
    index: Arc<SessionIndex>,
    settings: Settings,
    stop: CancellationToken,
) {
    let ws_config = WebSocketConfig::default()
        .read_buffer_size(settings.transport.read_buffer_size)
        .write_buffer_size(settings.transport.write_buffer_size);

    let ws_stream = match accept_async_with_config(stream, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(remote_addr = %peer, error = %err, "websocket handshake failed");
            return;
        }
    };
    let (ws_sink, ws_source) = ws_stream.split();

    let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
    let session = Session::new(broker, Arc::clone(&index), tx, stop);
    index.insert(session.id(), peer.to_string());
    info!(session_id = %session.id(), remote_addr = %peer, "client connected");

    session.send(ServerFrame::info("connected", None));

    let writer = tokio::spawn(write_loop(ws_sink, rx));
    read_loop(ws_source, &session).await;

    let session_id = session.id().to_string();
    session.close();
    drop(session);
    // With the session and its forwarders gone, the queue closes and the
    // writer drains what is pending, sends the close frame, and exits.
    let _ = writer.await;

    info!(session_id = %session_id, remote_addr = %peer, "client disconnected");
}

async fn read_loop(mut source: SplitStream<WebSocketStream<TcpStream>>, session: &Session) {
    loop {
        let msg = tokio::select! {
            _ = session.stop_token().cancelled() => break,
            next = timeout(READ_DEADLINE, source.next()) => match next {
                Err(_) => {
                    info!(session_id = %session.id(), "read deadline expired");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(err))) => {
                    debug!(session_id = %session.id(), error = %err, "read error");
                    break;
                }
                Ok(Some(Ok(msg))) => msg,
            },
        };

        match msg {
            WsMessage::Text(text) => session.handle_text(text.as_str()),
            WsMessage::Close(_) => break,
            // Control frames (ping/pong) only serve to reset the deadline.
            _ => {}
        }
    }
}

async fn write_loop(
    mut sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
    mut outbound: Receiver<ServerFrame>,
) {
    let mut keepalive = tokio::time::interval_at(
        tokio::time::Instant::now() + KEEPALIVE_INTERVAL,
        KEEPALIVE_INTERVAL,
    );

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize frame");
                            continue;
                        }
                    };
                    if !write_with_deadline(&mut sink, WsMessage::text(text)).await {
                        return;
                    }
                }
                None => {
                    // Queue closed: the session is closing. Best-effort
                    // close frame, then drop the connection.
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return;
                }
            },
            _ = keepalive.tick() => {
                if !write_with_deadline(&mut sink, WsMessage::Ping(tungstenite::Bytes::new())).await {
                    return;
                }
            }
        }
    }
}

async fn write_with_deadline(
    sink: &mut SplitSink<WebSocketStream<TcpStream>, WsMessage>,
    msg: WsMessage,
) -> bool {
    match timeout(WRITE_DEADLINE, sink.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            debug!(error = %err, "write error");
            false
        }
        Err(_) => {
            warn!("write deadline expired");
            false
        }
    }
}
