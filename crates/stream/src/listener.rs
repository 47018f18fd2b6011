//! TCP listener that runs one ingestion adapter per producer connection.

use std::future::Future;
use std::net::SocketAddr;

use telemetry_core::Reading;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, Instrument};

use crate::adapter::{CloseReason, IngestAdapter};
use crate::error::StreamResult;

/// Accepts producer connections and feeds decoded readings to a callback.
pub struct IngestListener {
    listener: TcpListener,
    adapter: IngestAdapter,
}

impl IngestListener {
    /// Bind the producer listener
    pub async fn bind(addr: SocketAddr, adapter: IngestAdapter) -> StreamResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, adapter })
    }

    /// Address actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> StreamResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept producers forever.
    ///
    /// Each connection gets its own task and its own clone of `on_reading`.
    /// A failing or closing producer never affects the others.
    pub async fn run<F, Fut>(self, on_reading: F)
    where
        F: FnMut(Reading) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        info!(
            addr = ?self.listener.local_addr().ok(),
            max_record_bytes = self.adapter.max_record_bytes(),
            "Ingest listener started"
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let adapter = self.adapter.clone();
                    let on_reading = on_reading.clone();
                    let span = tracing::info_span!("producer", peer = %peer_addr);

                    tokio::spawn(
                        async move { serve_producer(adapter, stream, peer_addr, on_reading).await }
                            .instrument(span),
                    );
                }
                Err(e) => {
                    error!("Failed to accept producer connection: {}", e);
                }
            }
        }
    }
}

async fn serve_producer<F, Fut>(
    adapter: IngestAdapter,
    stream: TcpStream,
    peer_addr: SocketAddr,
    on_reading: F,
) where
    F: FnMut(Reading) -> Fut,
    Fut: Future<Output = ()>,
{
    info!("Producer connected: {}", peer_addr);
    let summary = adapter.run(stream, on_reading).await;

    match &summary.close_reason {
        CloseReason::Eof => info!(
            decoded = summary.decoded,
            malformed = summary.malformed,
            bytes = summary.bytes_read,
            "Producer disconnected: {}",
            peer_addr
        ),
        CloseReason::Error(reason) => info!(
            decoded = summary.decoded,
            malformed = summary.malformed,
            bytes = summary.bytes_read,
            reason = %reason,
            "Producer connection lost: {}",
            peer_addr
        ),
    }
}
