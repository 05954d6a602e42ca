use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

use stockflow_api::config::{init_tracing, load_config};
use stockflow_api::events::{process_events, EventSender};
use stockflow_api::{app_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_level, config.log_json);
    info!(environment = %config.environment, "starting stockflow-api");

    let pool = db::establish_connection(&config).await?;
    db::run_migrations(&pool).await?;

    let (tx, rx) = mpsc::channel(config.event_channel_capacity);
    let event_task = tokio::spawn(process_events(rx));

    let state = AppState::new(Arc::new(pool), Arc::new(EventSender::new(tx)));
    let router = app_router(state);

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The server dropped its EventSender clones; the processing loop drains
    // and exits once the last sender is gone.
    if let Err(e) = event_task.await {
        error!(error = %e, "event processing task failed");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
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
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
