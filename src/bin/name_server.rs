//! Name server binary: loads config, starts the heartbeat loop, and serves
//! the single client/storage-server endpoint until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use sentra::config::NsConfig;
use sentra::ns::{heartbeat::Heartbeat, server, NameServer};

#[derive(Parser, Debug)]
#[command(about = "Sentra name server")]
struct Args {
    /// Path to a TOML config file; falls back to coded defaults if absent.
    #[arg(long, default_value = "ns.toml")]
    config: PathBuf,

    #[arg(long)]
    bind_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = NsConfig::load(&args.config);
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }

    let bind_addr = config.bind_addr;
    let ns = Arc::new(NameServer::new(config));

    Heartbeat::spawn(Arc::clone(&ns));

    tokio::select! {
        result = server::serve(ns, bind_addr) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down on interrupt");
            Ok(())
        }
    }
}
