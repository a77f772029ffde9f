// src/server.rs
//! TCP listener feeding tracker sentences to the decoder

use crate::{
    error::Result,
    framing::{Frame, SentenceCodec},
    protocol::{xexun, DecodeError, Position},
    registry::DeviceRegistry,
    reset::{ChannelEvent, ConnectionReset, Disconnect, ResetPolicy},
};
use futures::StreamExt;
use std::{io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, Notify},
};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Pause before accepting again after a listener error
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Handle used by the reset timer to close a TCP connection
#[derive(Debug, Default)]
pub struct TcpChannel {
    closed: Notify,
}

impl TcpChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once `disconnect` has been called
    pub async fn closed(&self) {
        self.closed.notified().await;
    }
}

impl Disconnect for TcpChannel {
    fn disconnect(&self) {
        // notify_one keeps a permit if the reader is not waiting yet
        self.closed.notify_one();
    }
}

/// Accepts tracker connections and decodes their sentences
pub struct DecoderServer {
    registry: Arc<dyn DeviceRegistry>,
    policy: ResetPolicy,
}

impl DecoderServer {
    pub fn new(registry: Arc<dyn DeviceRegistry>, policy: ResetPolicy) -> Self {
        Self { registry, policy }
    }

    pub async fn bind(addr: &str) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening for Xexun trackers on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept connections forever.
    ///
    /// Decoded positions are sent to `positions`; a connection stops reading
    /// once the receiver is gone. Accept errors are logged and retried.
    pub async fn run(&self, listener: TcpListener, positions: mpsc::Sender<Position>) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    let backoff = accept_backoff(&e);
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };
            info!(%peer, "Tracker connected");

            let registry = Arc::clone(&self.registry);
            let positions = positions.clone();
            let policy = self.policy;

            tokio::spawn(async move {
                handle_connection(stream, peer, registry, policy, positions).await;
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<dyn DeviceRegistry>,
    policy: ResetPolicy,
    positions: mpsc::Sender<Position>,
) {
    let channel = Arc::new(TcpChannel::new());
    let mut reset = ConnectionReset::new(policy, Arc::clone(&channel));
    reset.on_channel_event(&ChannelEvent::Connected(Some(peer)));

    let mut frames = FramedRead::new(stream, SentenceCodec::new());

    loop {
        tokio::select! {
            _ = channel.closed() => {
                info!(%peer, "Connection reset");
                break;
            }
            frame = frames.next() => match frame {
                None => break, // EOF
                Some(Ok(Frame::Sentence(sentence))) => {
                    if sentence.trim().is_empty() {
                        continue;
                    }

                    match xexun::decode(&sentence, registry.as_ref()) {
                        Ok(position) => {
                            debug!(%peer, device = %position.device_id, at = %position.format_coordinates(), "Position decoded");
                            reset.on_decoded();
                            if positions.send(position).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(%peer, "Failed to decode sentence: {}", e),
                    }
                }
                Some(Ok(Frame::NotUtf8)) => {
                    warn!(%peer, "Failed to decode sentence: {} (not UTF-8)", DecodeError::MalformedSentence);
                }
                Some(Ok(Frame::Overlong)) => {
                    warn!(%peer, "Failed to decode sentence: {} (line too long)", DecodeError::MalformedSentence);
                }
                Some(Err(e)) => {
                    warn!(%peer, "Error reading from tracker: {}", e);
                    break;
                }
            }
        }
    }

    reset.on_channel_event(&ChannelEvent::Disconnected);
    info!(%peer, "Tracker disconnected");
}

/// Aborted handshakes are per-connection; anything else (fd exhaustion and
/// the like) gets a pause so the loop does not spin.
fn accept_backoff(error: &io::Error) -> Duration {
    match error.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => Duration::ZERO,
        _ => ACCEPT_BACKOFF,
    }
}
