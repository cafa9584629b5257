use kestrel::clock::{Clock, SystemClock};
use kestrel::command::CommandTable;
use kestrel::config::Config;
use kestrel::persistence::aof::{self, Aof};
use kestrel::server::{self, ServerState};
use kestrel::store::expiry::run_active_expiry;
use kestrel::store::{SharedStore, Store};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.loglevel)))
        .init();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut store = Store::new(clock.clone());

    let aof = if config.appendonly {
        let path = config.aof_path();
        info!("replaying AOF from {}", path.display());
        let stats = aof::replay(&path, &CommandTable::new(), &mut store, config.aof_load_strict)?;
        info!(
            applied = stats.applied,
            failed = stats.failed,
            truncated = stats.truncated,
            "AOF loaded"
        );
        Some(Aof::open(path, config.aof_settings()).await?)
    } else {
        None
    };

    let store: SharedStore = Arc::new(Mutex::new(store));
    if let Some(aof) = &aof {
        aof.spawn_writer();
        aof.spawn_auto_rewrite(store.clone());
    }

    let shutdown = CancellationToken::new();
    let expiry = tokio::spawn(run_active_expiry(
        store.clone(),
        config.expiry_settings(),
        shutdown.clone(),
    ));

    let listener = TcpListener::bind(config.listen_addr()).await?;
    let state = Arc::new(ServerState::new(store, aof.clone()));
    let server = tokio::spawn(server::run_server(listener, state, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown.cancel();

    match server.await {
        Ok(Err(e)) => error!("server stopped with error: {e}"),
        Err(e) => error!("server task failed: {e}"),
        Ok(Ok(())) => {}
    }
    let _ = expiry.await;
    if let Some(aof) = aof {
        aof.shutdown(config.shutdown_timeout()).await;
    }
    info!("bye");
    Ok(())
}
