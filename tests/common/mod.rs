use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use sentra::config::{NsConfig, SsConfig};
use sentra::ns::NameServer;
use sentra::ss::StorageServer;
use tempfile::TempDir;

/// An `SsConfig` rooted in a fresh tempdir, unbound (tests drive the
/// storage server directly through its library API, never its sockets).
pub fn ss_fixture() -> (StorageServer, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let config = SsConfig {
        root: dir.path().join("storage"),
        checkpoint_root: dir.path().join("checkpoints"),
        ..Default::default()
    };
    let ss = StorageServer::new(config).expect("construct storage server");
    (ss, dir)
}

/// A `NameServer` backed by a tempdir persistence file, never actually
/// bound to a socket.
pub fn ns_fixture() -> (NameServer, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let config = NsConfig { persistence_path: dir.path().join("ns_state.toml"), ..Default::default() };
    (NameServer::new(config), dir)
}

pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}
