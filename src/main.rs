// src/main.rs
// Process bootstrap: tracing-subscriber init, AppState construction, Hub
// spawn, response fan-in task spawn, axum server bind/serve, graceful
// shutdown driving the Hub's shutdown ritual.

use std::sync::Arc;

use chatroom_server::api::create_router;
use chatroom_server::broker;
use chatroom_server::config::CONFIG;
use chatroom_server::hub::{self, Hub};
use chatroom_server::metrics::init_metrics;
use chatroom_server::state::AppState;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("starting chatroom server");

    init_metrics();

    let config = Arc::new(CONFIG.clone());
    let (hub, shutdown_tx) = Hub::spawn();
    let state = AppState::new(config.clone(), hub.clone()).await?;

    info!(bot_user_id = %config.broker.bot_user_id, "starting response fan-in consumer");
    let (fanin_shutdown_tx, fanin_shutdown_rx) = tokio::sync::watch::channel(false);
    let broker_for_fanin = state.broker.clone();
    let hub_for_fanin = hub.clone();
    let bot_user_id = config.broker.bot_user_id.clone();
    let fanin_task = tokio::spawn(async move {
        broker::consumer::run(&broker_for_fanin, hub_for_fanin, bot_user_id, fanin_shutdown_rx).await;
    });

    let app = create_router(state);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    serve.await?;

    info!("shutdown signal received, draining hub");
    hub::shutdown(&hub, &shutdown_tx).await;
    let _ = fanin_shutdown_tx.send(true);
    let _ = fanin_task.await;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
