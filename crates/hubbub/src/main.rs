//! CLI for hubbub
//!
//! Subcommands:
//! - `server`: run the broker (WebSocket streaming + HTTP admin surfaces)
//! - `client`: run a simple smoke-test client (subscribe, publish, print
//!   whatever comes back)

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hubbub_admin::AppState;
use hubbub_broker::{Broker, SessionDirectory};
use hubbub_config::load_config;
use hubbub_transport::SessionIndex;

/// How long graceful shutdown may take before the process gives up waiting.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "hubbub")]
enum Command {
    /// Start the broker
    Server,
    /// Run the smoke-test client against a running broker. The topic must
    /// already exist (create it via the admin surface).
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Topic to subscribe and publish to
        #[arg(long, default_value = "demo")]
        topic: String,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(err) = run_server().await {
                error!("server failed: {err}");
                std::process::exit(1);
            }
        }
        Command::Client { url, topic } => {
            hubbub_utils::logging::init("info", "text");
            if let Err(err) = run_client(&url, &topic).await {
                error!("client failed: {err}");
                std::process::exit(1);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_config()?;
    settings.validate()?;
    hubbub_utils::logging::init(&settings.log.level, &settings.log.format);

    info!(
        host = %settings.server.host,
        port = settings.server.port,
        admin_port = settings.server.admin_port,
        max_messages_per_topic = settings.broker.max_messages_per_topic,
        max_publish_rate = settings.broker.max_publish_rate,
        "configuration loaded"
    );

    let broker = Arc::new(Broker::new(settings.broker.max_messages_per_topic));
    let index = Arc::new(SessionIndex::new());
    let shutdown = CancellationToken::new();

    let streaming_listener =
        TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    let admin_listener =
        TcpListener::bind((settings.server.host.as_str(), settings.server.admin_port)).await?;

    let sessions: Arc<dyn SessionDirectory> = Arc::clone(&index) as Arc<dyn SessionDirectory>;
    let admin_app = hubbub_admin::router(AppState {
        broker: Arc::clone(&broker),
        sessions,
    });
    info!(addr = %admin_listener.local_addr()?, "admin server listening");

    let admin_shutdown = shutdown.clone();
    let admin = tokio::spawn(async move {
        if let Err(err) = axum::serve(admin_listener, admin_app)
            .with_graceful_shutdown(async move { admin_shutdown.cancelled().await })
            .await
        {
            error!("admin server failed: {err}");
        }
    });

    let streaming = tokio::spawn(hubbub_transport::serve(
        streaming_listener,
        Arc::clone(&broker),
        Arc::clone(&index),
        settings.clone(),
        shutdown.clone(),
    ));

    info!("server started, press ctrl-c to shut down gracefully");
    tokio::signal::ctrl_c().await?;

    info!("shutdown signal received, draining sessions");
    shutdown.cancel();

    let drained = tokio::time::timeout(SHUTDOWN_DEADLINE, async {
        let _ = streaming.await;
        let _ = admin.await;
    })
    .await;
    if drained.is_err() {
        warn!("graceful shutdown deadline expired, exiting anyway");
    }

    info!("shutdown complete");
    Ok(())
}

async fn run_client(url: &str, topic: &str) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;

    // Welcome frame
    if let Some(Ok(WsMessage::Text(msg))) = ws_stream.next().await {
        println!("Server: {msg}");
    }

    // Subscribe with a small replay window
    let subscribe = json!({
        "type": "subscribe",
        "topic": topic,
        "last_n": 5,
        "request_id": hubbub_utils::id::correlation_id(),
    });
    ws_stream
        .send(WsMessage::text(subscribe.to_string()))
        .await?;

    // Publish a probe message to ourselves
    let publish = json!({
        "type": "publish",
        "topic": topic,
        "message": {
            "id": hubbub_utils::id::correlation_id(),
            "payload": "hello from the hubbub smoke client",
        },
        "request_id": hubbub_utils::id::correlation_id(),
    });
    ws_stream.send(WsMessage::text(publish.to_string())).await?;

    // Print whatever the server sends back (acks, replayed events, the
    // probe event, or an error if the topic does not exist).
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_secs(2), ws_stream.next()).await {
            Ok(Some(Ok(WsMessage::Text(msg)))) => println!("Incoming: {msg}"),
            Ok(Some(Ok(_))) => continue,
            _ => break,
        }
    }

    ws_stream.close(None).await?;
    Ok(())
}
