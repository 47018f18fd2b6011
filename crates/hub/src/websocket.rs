//! WebSocket server for real-time reading delivery
//!
//! Each accepted connection becomes one hub subscriber. The connection task
//! drains the subscriber's outbox into the socket, one text message per
//! reading, until the client leaves or the hub evicts it.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use telemetry_core::WebSocketConfig;

use crate::access::OriginPolicy;
use crate::hub::FanOutHub;

/// WebSocket server errors
#[derive(Debug, Error)]
pub enum WsError {
    /// Listener could not be bound
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake rejected or protocol failure
    #[error("WebSocket error: {0}")]
    Protocol(#[from] tokio_tungstenite::tungstenite::Error),
}

/// WebSocket server state
pub struct WsServer {
    /// Hub every connection subscribes to
    hub: Arc<FanOutHub>,

    /// Request path subscribers must use
    path: String,

    /// Browser origins allowed to connect
    origins: OriginPolicy,

    /// Per-subscriber outbox depth
    outbox_capacity: usize,

    /// Server address
    addr: SocketAddr,
}

impl WsServer {
    /// Create new WebSocket server
    pub fn new(hub: Arc<FanOutHub>, config: &WebSocketConfig, origins: OriginPolicy) -> Self {
        Self {
            hub,
            path: config.path.clone(),
            origins,
            outbox_capacity: config.outbox_capacity,
            addr: config.bind_addr,
        }
    }

    /// Bind the configured address and serve forever
    pub async fn run(self: Arc<Self>) -> Result<(), WsError> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Serve on an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        info!(
            origins = ?self.origins.allowed(),
            "WebSocket server listening on {:?}{}",
            listener.local_addr().ok(),
            self.path
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("New WebSocket connection from {}", peer_addr);
                    let server = Arc::clone(&self);

                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, peer_addr).await {
                            warn!("WebSocket connection from {} ended: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Check path and origin before upgrading.
    fn check_handshake(&self, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        if request.uri().path() != self.path {
            return Err(reject(StatusCode::NOT_FOUND, "unknown path"));
        }

        let origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        if !self.origins.allows(origin) {
            warn!(origin = ?origin, "Rejected subscriber from disallowed origin");
            return Err(reject(StatusCode::FORBIDDEN, "origin not allowed"));
        }

        Ok(response)
    }

    /// Handle individual WebSocket connection
    async fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<(), WsError> {
        let ws_stream = accept_hdr_async(stream, |request: &Request, response: Response| {
            self.check_handshake(request, response)
        })
        .await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (subscriber, mut outbox) = self.hub.subscribe(self.outbox_capacity).await;
        info!(subscriber = %subscriber.id(), "Subscriber connected: {}", peer_addr);

        loop {
            tokio::select! {
                // Client side: only close frames and errors matter
                incoming = ws_receiver.next() => {
                    match incoming {
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Client {} disconnected", peer_addr);
                            break;
                        }
                        Some(Ok(Message::Text(text))) => {
                            debug!("Ignoring message from {}: {}", peer_addr, text);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Error receiving from {}: {}", peer_addr, e);
                            break;
                        }
                    }
                }

                // Hub side: forward readings until evicted
                payload = outbox.next() => {
                    let Some(json) = payload else {
                        info!("Subscriber {} closed by hub", peer_addr);
                        break;
                    };

                    // A client that stops reading must not outlive its eviction
                    tokio::select! {
                        sent = ws_sender.send(Message::Text(json.to_string())) => {
                            if let Err(e) = sent {
                                warn!("Error sending to {}: {}", peer_addr, e);
                                break;
                            }
                        }
                        _ = outbox.closed() => {
                            info!("Subscriber {} closed by hub during send", peer_addr);
                            break;
                        }
                    }
                }
            }
        }

        self.hub.unregister(&subscriber).await;
        if timeout(self.hub.delivery_timeout(), ws_sender.close()).await.is_err() {
            debug!("Close handshake with {} timed out", peer_addr);
        }
        Ok(())
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}
