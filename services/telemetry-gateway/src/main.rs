use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use telemetry_core::{logging, Config, Reading};
use telemetry_hub::{FanOutHub, OriginPolicy, WsServer};
use telemetry_stream::{IngestAdapter, IngestListener};
use tokio::net::TcpListener;
use tracing::{error, info};

mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = parse_config_path(&args)?;
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    logging::init_with(config.logging.format);
    info!(
        http = %config.http.bind_addr,
        websocket = %config.websocket.bind_addr,
        ingest = %config.ingest.bind_addr,
        delivery_timeout_ms = config.hub.delivery_timeout_ms,
        "Starting telemetry gateway"
    );

    let hub = Arc::new(FanOutHub::from_config(&config.hub));

    let adapter = IngestAdapter::from_config(&config.ingest)?;
    let ingest = IngestListener::bind(config.ingest.bind_addr, adapter)
        .await
        .context("failed to bind ingest listener")?;

    let ws_server = Arc::new(WsServer::new(
        Arc::clone(&hub),
        &config.websocket,
        OriginPolicy::new(&config.http.allowed_origins),
    ));
    let ws_listener = TcpListener::bind(config.websocket.bind_addr)
        .await
        .context("failed to bind websocket listener")?;

    let app = routes::router(&config.http.allowed_origins);
    let http_listener = TcpListener::bind(config.http.bind_addr)
        .await
        .context("failed to bind http listener")?;
    info!("Health endpoint listening on {}", config.http.bind_addr);

    let on_reading = {
        let hub = Arc::clone(&hub);
        move |reading: Reading| {
            let hub = Arc::clone(&hub);
            async move {
                hub.broadcast(&reading).await;
            }
        }
    };

    tokio::select! {
        _ = ingest.run(on_reading) => {}
        _ = ws_server.serve(ws_listener) => {}
        result = axum::serve(http_listener, app).into_future() => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("Shutting down telemetry gateway");
    Ok(())
}

fn parse_config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    let mut args_iter = args.iter().skip(1);
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            return match args_iter.next() {
                Some(path) => Ok(Some(PathBuf::from(path))),
                None => bail!("--config was provided without a path"),
            };
        }
    }

    Ok(None)
}
