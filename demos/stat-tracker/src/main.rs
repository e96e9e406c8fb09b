//! Party stat tracker: a roomcast hub with one room opened at startup.
//!
//! Browsers join with the logged room code and publish their level, gear,
//! race and class; everyone at the table sees changes as they happen.
//!
//! `PORT` picks the listening port (default 8080). `RUST_LOG` filters logs
//! (default `info`).

use roomcast::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 8080;

/// Listening address for a raw `PORT` value. Unset or unparseable values
/// fall back to [`DEFAULT_PORT`].
fn bind_addr(port: Option<&str>) -> String {
    let port = match port.map(str::parse::<u16>) {
        Some(Ok(port)) => port,
        Some(Err(e)) => {
            tracing::warn!(error = %e, default = DEFAULT_PORT, "ignoring invalid PORT");
            DEFAULT_PORT
        }
        None => DEFAULT_PORT,
    };
    format!("0.0.0.0:{port}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = bind_addr(std::env::var("PORT").ok().as_deref());
    let server = RoomcastServer::builder().bind(&addr).build().await?;

    let table = roomcast::api::create_room(server.manager()).await;
    tracing::info!(%addr, room_code = %table.code, "stat tracker ready");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}
