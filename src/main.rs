//! revecho: a reversed-echo TCP server.
//!
//! Accepts any number of concurrent connections on a single reactor
//! thread, greets each client, and answers every received chunk with its
//! bytes reversed except the last one (so a trailing newline stays put).
//!
//! The main thread only waits for SIGINT/SIGTERM, then stops the reactor
//! and joins it before exiting.

mod config;
mod runtime;
mod signal;

use config::Config;
use runtime::Reactor;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        max_connections = config.max_connections,
        buffer_size = config.buffer_size,
        "Starting revecho server"
    );

    signal::block()?;

    let (mut reactor, handle) = Reactor::new(&config)?;
    let reactor_thread = thread::Builder::new()
        .name("reactor".to_string())
        .spawn(move || {
            if let Err(e) = reactor.run() {
                error!(error = %e, "Reactor failed");
            }
        })?;

    let sig = signal::wait()?;
    info!(signal = sig, "Termination signal received, stopping reactor");

    handle.stop();
    let _ = reactor_thread.join();

    info!("Shutdown complete");
    Ok(())
}
