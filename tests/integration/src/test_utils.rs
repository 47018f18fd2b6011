//! Test utilities for end-to-end pipeline tests

use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use telemetry_core::{Reading, WebSocketConfig};
use telemetry_hub::{FanOutHub, OriginPolicy, WsServer};
use telemetry_stream::{IngestAdapter, IngestListener};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// Client side of a subscriber connection
pub type SubscriberClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for any single event
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Hub, ingest listener and WebSocket server on ephemeral ports
pub struct TestPipeline {
    pub hub: Arc<FanOutHub>,
    pub ingest_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub ws_path: String,
}

impl TestPipeline {
    /// Start every component on 127.0.0.1 with OS-assigned ports
    pub async fn start(delivery_timeout: Duration) -> Self {
        init_tracing();

        let hub = Arc::new(FanOutHub::new(delivery_timeout));

        let adapter = IngestAdapter::new(64 * 1024).expect("adapter");
        let ingest = IngestListener::bind("127.0.0.1:0".parse().unwrap(), adapter)
            .await
            .expect("bind ingest");
        let ingest_addr = ingest.local_addr().expect("ingest addr");
        let on_reading = {
            let hub = Arc::clone(&hub);
            move |reading: Reading| {
                let hub = Arc::clone(&hub);
                async move {
                    hub.broadcast(&reading).await;
                }
            }
        };
        tokio::spawn(ingest.run(on_reading));

        let ws_config = WebSocketConfig::default();
        let ws_path = ws_config.path.clone();
        let ws_server = Arc::new(WsServer::new(
            Arc::clone(&hub),
            &ws_config,
            OriginPolicy::new(["http://localhost:3000"]),
        ));
        let ws_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws");
        let ws_addr = ws_listener.local_addr().expect("ws addr");
        tokio::spawn(ws_server.serve(ws_listener));

        Self {
            hub,
            ingest_addr,
            ws_addr,
            ws_path,
        }
    }

    /// Connect a subscriber and wait until the hub has registered it
    pub async fn subscribe(&self) -> SubscriberClient {
        let before = self.hub.subscriber_count().await;
        let url = format!("ws://{}{}", self.ws_addr, self.ws_path);
        let (client, _) = connect_async(url).await.expect("websocket connect");
        self.wait_for_subscribers(before + 1).await;
        client
    }

    /// Open a producer connection
    pub async fn producer(&self) -> TcpStream {
        TcpStream::connect(self.ingest_addr)
            .await
            .expect("producer connect")
    }

    /// Poll the hub until it reports `count` subscribers
    pub async fn wait_for_subscribers(&self, count: usize) {
        let hub = Arc::clone(&self.hub);
        timeout(STEP_TIMEOUT, async move {
            while hub.subscriber_count().await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("hub never reached {count} subscribers"));
    }
}

/// Write readings as wire records
pub async fn send_readings(producer: &mut TcpStream, readings: &[Reading]) {
    for reading in readings {
        let line = reading.to_wire_line().expect("encode");
        producer.write_all(&line).await.expect("producer write");
    }
}

/// Write raw bytes to a producer connection
pub async fn send_raw(producer: &mut TcpStream, bytes: &[u8]) {
    producer.write_all(bytes).await.expect("producer write");
}

/// Next reading delivered to a subscriber, skipping control frames
pub async fn next_reading(client: &mut SubscriberClient) -> Reading {
    loop {
        let msg = timeout(STEP_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for reading")
            .expect("stream ended")
            .expect("websocket error");

        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("reading json");
        }
    }
}

/// Deterministic reading fixture
pub fn reading(sensor: usize, seq: usize) -> Reading {
    Reading::new(
        format!("sensor-{sensor}"),
        20.0 + seq as f64 * 0.25,
        101.0,
        42.5,
    )
}
