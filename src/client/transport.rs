/**
 * Event Channel Transport
 *
 * A background task owning the websocket connection.
 *
 * # Lifecycle
 *
 * 1. Connect to `<ws_url>?token=<jwt>`
 * 2. On success emit `Connected`, then forward decoded `ServerFrame`s and
 *    write queued `ClientFrame`s until the socket drops
 * 3. Emit `Disconnected` and retry with exponential backoff
 *
 * After `degraded_after` consecutive failed attempts a single `Degraded` is
 * emitted; the next successful connect resets the counter.
 *
 * Frames submitted while disconnected stay queued and are written after the
 * next handshake. Room membership does not survive a reconnect on the
 * server, so the owner re-joins its rooms when it sees `Connected`.
 */

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::client::config::ClientConfig;
use crate::client::error::{ClientError, ClientResult};
use crate::shared::protocol::{ClientFrame, ServerFrame};

const EVENT_QUEUE: usize = 256;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Frame(ServerFrame),
    Disconnected,
    /// Reconnecting keeps failing; live updates are unavailable
    Degraded,
}

/// Handle to the background connection task
#[derive(Debug)]
pub struct Transport {
    commands: mpsc::UnboundedSender<ClientFrame>,
    task: JoinHandle<()>,
}

enum SessionEnd {
    Lost,
    Shutdown,
}

impl Transport {
    /// Start connecting in the background
    pub fn spawn(config: ClientConfig) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::channel(EVENT_QUEUE);
        let task = tokio::spawn(run(config, command_rx, events));
        (Self { commands, task }, event_rx)
    }

    /// Queue a frame for the server
    pub fn send(&self, frame: ClientFrame) -> ClientResult<()> {
        self.commands.send(frame).map_err(|_| ClientError::TransportLost)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

fn endpoint(config: &ClientConfig) -> String {
    match config.token() {
        Some(token) => format!("{}?token={}", config.ws_url(), token),
        None => config.ws_url(),
    }
}

async fn run(
    config: ClientConfig,
    mut commands: mpsc::UnboundedReceiver<ClientFrame>,
    events: mpsc::Sender<TransportEvent>,
) {
    let url = endpoint(&config);
    let policy = config.reconnect.clone();
    let mut failures: u32 = 0;

    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                if failures > 0 {
                    tracing::info!("[Transport] Reconnected after {} failed attempt(s)", failures);
                } else {
                    tracing::info!("[Transport] Connected to {}", config.ws_url());
                }
                failures = 0;
                if events.send(TransportEvent::Connected).await.is_err() {
                    return;
                }

                match pump(socket, &mut commands, &events).await {
                    SessionEnd::Shutdown => return,
                    SessionEnd::Lost => {
                        tracing::warn!("[Transport] Connection lost");
                        if events.send(TransportEvent::Disconnected).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!("[Transport] Connect attempt {} failed: {}", failures, e);
                if failures == policy.degraded_after
                    && events.send(TransportEvent::Degraded).await.is_err()
                {
                    return;
                }
            }
        }

        if events.is_closed() {
            return;
        }
        tokio::time::sleep(policy.delay_for(failures.max(1))).await;
    }
}

/// Shuttle frames both ways until the socket or the owner goes away
async fn pump(
    socket: Socket,
    commands: &mut mpsc::UnboundedReceiver<ClientFrame>,
    events: &mpsc::Sender<TransportEvent>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match ServerFrame::parse(text.as_str()) {
                        Ok(frame) => {
                            if events.send(TransportEvent::Frame(frame)).await.is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => tracing::debug!("[Transport] Ignoring unreadable frame: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("[Transport] Socket error: {}", e);
                    return SessionEnd::Lost;
                }
            },
            command = commands.recv() => {
                let Some(frame) = command else {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                };
                let payload = match serde_json::to_string(&frame) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!("[Transport] Failed to encode frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(payload.into())).await {
                    tracing::debug!("[Transport] Write failed: {}", e);
                    return SessionEnd::Lost;
                }
            }
        }
    }
}
