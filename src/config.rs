//! Per-binary configuration, loaded from an optional TOML file with a
//! coded [`Default`] fallback when the file is missing or fails to parse.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

fn load<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file found, using defaults");
        return T::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config file, using defaults");
            return T::default();
        }
    };

    match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse config file, using defaults");
            T::default()
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NsConfig {
    pub bind_addr: SocketAddr,
    pub heartbeat_interval_secs: u64,
    pub probe_timeout_millis: u64,
    pub dial_timeout_secs: u64,
    pub persistence_path: PathBuf,
    pub cache_ttl_secs: u64,
}

impl Default for NsConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8900),
            heartbeat_interval_secs: 5,
            probe_timeout_millis: 300,
            dial_timeout_secs: 3,
            persistence_path: PathBuf::from("ns_state.toml"),
            cache_ttl_secs: 60,
        }
    }
}

impl NsConfig {
    pub fn load(path: &Path) -> Self {
        load(path)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Timeout for the 300ms existence probe VIEW/INFO/locate issue against
    /// a storage server's control endpoint.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_millis)
    }

    /// Timeout for the CREATE/DELETE/MOVE/CREATEFOLDER forwarding RPCs,
    /// the legacy 3s recv window the original name server used for these
    /// (spec.md §5's "NS->SS CREATE probe (legacy variant): 3 s recv").
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SsConfig {
    pub control_bind: SocketAddr,
    pub client_bind: SocketAddr,
    pub advertise_ip: IpAddr,
    pub name_server_addr: SocketAddr,
    pub root: PathBuf,
    pub checkpoint_root: PathBuf,
}

impl Default for SsConfig {
    fn default() -> Self {
        Self {
            control_bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 9100),
            client_bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 9101),
            advertise_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            name_server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8900),
            root: PathBuf::from("ss_storage"),
            checkpoint_root: PathBuf::from("ss_storage/.checkpoints"),
        }
    }
}

impl SsConfig {
    pub fn load(path: &Path) -> Self {
        load(path)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub name_server_addr: SocketAddr,
    pub username: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name_server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8900),
            username: String::new(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Self {
        load(path)
    }
}
