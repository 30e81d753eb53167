//! Storage server binary: registers with the name server, then serves its
//! control and client endpoints concurrently.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use sentra::config::SsConfig;
use sentra::ss::{server, StorageServer};

#[derive(Parser, Debug)]
#[command(about = "Sentra storage server")]
struct Args {
    #[arg(long, default_value = "ss.toml")]
    config: PathBuf,

    #[arg(long)]
    control_bind: Option<SocketAddr>,

    #[arg(long)]
    client_bind: Option<SocketAddr>,

    /// IP this server advertises to clients, distinct from its bind
    /// address when running behind NAT/containers.
    #[arg(long)]
    advertise_ip: Option<IpAddr>,

    #[arg(long)]
    name_server_addr: Option<SocketAddr>,

    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = SsConfig::load(&args.config);
    if let Some(v) = args.control_bind {
        config.control_bind = v;
    }
    if let Some(v) = args.client_bind {
        config.client_bind = v;
    }
    if let Some(v) = args.advertise_ip {
        config.advertise_ip = v;
    }
    if let Some(v) = args.name_server_addr {
        config.name_server_addr = v;
    }
    if let Some(v) = args.root {
        config.checkpoint_root = v.join(".checkpoints");
        config.root = v;
    }

    let ss = Arc::new(StorageServer::new(config)?);

    tokio::select! {
        result = server::run(ss) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down on interrupt");
            Ok(())
        }
    }
}
