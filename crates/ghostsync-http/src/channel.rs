//! Per-session WebSocket channels.
//!
//! Each discovery request gets its own listener on an ephemeral port. The
//! listener serves exactly one session: the first WebSocket upgrade claims it
//! and the listener stops accepting connections. A listener nobody connects to
//! closes after `channel_idle_timeout`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use futures::{SinkExt, StreamExt};
use ghostsync_core::{Session, SessionChannel};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};

use crate::error::DiscoveryBindError;
use crate::state::{shutdown_requested, SharedState};

/// Frames buffered per direction before the producer waits.
const FRAME_BUFFER: usize = 32;

struct ChannelState {
    shared: Arc<SharedState>,
    port: u16,
    claimed: AtomicBool,
    connected: Notify,
}

/// Bind a new session channel and start serving it.
///
/// Returns the bound port; the listener is accepting by the time this returns.
pub async fn open(shared: Arc<SharedState>) -> Result<u16, DiscoveryBindError> {
    let listener = TcpListener::bind(SocketAddr::new(shared.bind_ip, 0)).await?;
    let port = listener.local_addr()?.port();

    let channel = Arc::new(ChannelState {
        shared,
        port,
        claimed: AtomicBool::new(false),
        connected: Notify::new(),
    });

    let app = Router::new()
        .fallback(ws_handler)
        .with_state(Arc::clone(&channel));

    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(stop_listening(Arc::clone(&channel)))
            .await;
        if let Err(e) = result {
            log::error!("Session channel on port {} failed: {}", channel.port, e);
        }
        log::debug!("Session channel on port {} stopped listening", channel.port);
    });

    Ok(port)
}

/// Resolves when the listener should stop accepting connections.
async fn stop_listening(channel: Arc<ChannelState>) {
    let idle_timeout = channel.shared.config.channel_idle_timeout;
    tokio::select! {
        _ = channel.connected.notified() => {}
        _ = tokio::time::sleep(idle_timeout) => {
            if !channel.claimed.load(Ordering::SeqCst) {
                log::info!(
                    "No connection on port {} within {:?}, closing",
                    channel.port,
                    idle_timeout
                );
            }
        }
        _ = shutdown_requested(channel.shared.shutdown_signal()) => {}
    }
}

/// Handler for any request on a session channel.
async fn ws_handler(ws: WebSocketUpgrade, State(channel): State<Arc<ChannelState>>) -> Response {
    if channel.claimed.swap(true, Ordering::SeqCst) {
        log::warn!("Rejected second connection on session channel {}", channel.port);
        return (StatusCode::CONFLICT, "Session channel already in use").into_response();
    }

    ws.on_upgrade(move |socket| async move {
        channel.connected.notify_one();
        handle_socket(socket, channel).await;
    })
}

/// Bridge one WebSocket to a session until either side closes.
async fn handle_socket(socket: WebSocket, channel: Arc<ChannelState>) {
    let shared = Arc::clone(&channel.shared);
    let (mut sender, mut receiver) = socket.split();
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(FRAME_BUFFER);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(FRAME_BUFFER);

    let session = Session::new(Arc::clone(&shared.host), &shared.config.session);
    let session_id = session.id().clone();
    shared.registry.insert(session_id.clone(), channel.port);
    log::info!("Session {} connected on port {}", session_id, channel.port);

    // Forward client frames to the session
    let recv_id = session_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let frame = match msg {
                Ok(Message::Text(text)) => text.as_str().to_owned(),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        log::warn!("Session {}: non-UTF-8 binary frame, closing", recv_id);
                        break;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    log::debug!("Session {}: receive failed: {}", recv_id, e);
                    break;
                }
            };
            if inbound_tx.send(frame).await.is_err() {
                break; // Session ended
            }
        }
    });

    // Forward session frames to the client, then close the socket once
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                return; // Client disconnected
            }
        }
        let _ = sender.send(Message::Close(None)).await;
        let _ = sender.close().await;
    });

    let session_channel =
        SessionChannel::new(inbound_rx, outbound_tx).with_shutdown(shared.shutdown_signal());
    // Errors are logged by the session; the client only sees the close.
    let _ = session.run(session_channel).await;

    let _ = send_task.await;
    recv_task.abort();
    shared.registry.remove(&session_id);
}
