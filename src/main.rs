#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else)]

use crate::{
    config::RuntimeConfiguration,
    error::{AppResult, BindSnafu, ServeSnafu},
    state::{AppState, open_pool},
};
use snafu::ResultExt;
use tokio::{net::TcpListener, signal};

#[macro_use]
extern crate tracing;

mod config;
mod data;
mod error;
mod lookup;
mod query;
mod routes;
mod state;
mod storage;
mod telemetry;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("signal received, starting graceful shutdown");
}

async fn run() -> AppResult<()> {
    let dotenv = dotenvy::dotenv();
    let config = RuntimeConfiguration::new()?;
    telemetry::init(config.environment)?;

    info!("`tracing` online");
    if let Err(e) = dotenv {
        debug!(?e, "no .env file loaded");
    }

    let pool = open_pool(&config).await?;
    let app = routes::router(AppState::from_pool(pool.clone(), &config));

    let server_ip = config.server_ip.clone();
    let listener = TcpListener::bind(&server_ip)
        .await
        .context(BindSnafu { addr: server_ip.clone() })?;

    info!(?server_ip, sql_echo = ?config.sql_echo, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(ServeSnafu)?;

    pool.close().await;
    info!("database pool closed");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}", snafu::Report::from_error(e));
        std::process::exit(1);
    }
}
