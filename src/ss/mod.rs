//! The Storage Server: on-disk content, per-file sentence locks/undo,
//! checkpoints, and single-hop replication to a partner announced by the
//! name server.

pub mod checkpoint;
pub mod handlers_client;
pub mod handlers_control;
pub mod replication;
pub mod sentence;
pub mod server;
pub mod state;
pub mod store;

use crate::config::SsConfig;
use checkpoint::CheckpointStore;
use replication::Partner;
use state::FileRegistry;
use store::Store;

pub struct StorageServer {
    pub store: Store,
    pub checkpoints: CheckpointStore,
    pub files: FileRegistry,
    pub partner: Partner,
    pub config: SsConfig,
}

impl StorageServer {
    pub fn new(config: SsConfig) -> std::io::Result<Self> {
        let store = Store::new(&config.root)?;
        let checkpoints = CheckpointStore::new(&config.checkpoint_root);
        let files = FileRegistry::new();

        for filename in store.scan_existing() {
            files.touch(&filename);
        }

        Ok(StorageServer { store, checkpoints, files, partner: Partner::new(), config })
    }
}
