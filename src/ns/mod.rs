//! The Name Server: global namespace, ACL, SS/client membership, routing.

pub mod handlers;
pub mod heartbeat;
pub mod persistence;
pub mod resync;
pub mod server;
mod ss_link;
pub mod state;
pub mod trie;

use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use moka::sync::Cache;

use crate::config::NsConfig;
use state::{ClientRecord, FileRecord, SsEndpoint, SsId, SsRecord};
use trie::FileTrie;

pub const RECENTS_LIMIT: usize = 5;
pub const MAX_ACL_ENTRIES: usize = 256;
pub const MAX_PENDING_REQUESTS: usize = 256;
pub const MAX_SS: usize = 10_000;
pub const MAX_CLIENTS: usize = 100_000;

/// What an existence probe against a storage server concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists { word_count: u64, char_count: u64, size: u64 },
    Stale,
    Unknown,
}

pub struct NameServer {
    pub files: DashMap<String, FileRecord>,
    pub trie: Mutex<FileTrie>,
    pub cache: Cache<String, FileRecord>,
    pub ss_roster: DashMap<SsId, SsRecord>,
    pub clients: DashMap<String, ClientRecord>,
    next_ss_id: AtomicU32,
    pub persistence: persistence::PersistenceHandle,
    pub config: NsConfig,
}

impl NameServer {
    pub fn new(config: NsConfig) -> Self {
        let persistence = persistence::PersistenceHandle::new(config.persistence_path.clone());
        let snapshot = persistence.load();

        let files = DashMap::new();
        let mut trie = FileTrie::new();
        for f in snapshot.files {
            trie.insert(&f.filename);
            files.insert(f.filename.clone(), f);
        }

        let ss_roster = DashMap::new();
        let mut next_id = 0u32;
        for s in snapshot.ss_records {
            next_id = next_id.max(s.ss_id + 1);
            ss_roster.insert(s.ss_id, s);
        }

        let cache = Cache::builder()
            .time_to_live(config.cache_ttl())
            .max_capacity(10_000)
            .build();

        NameServer {
            files,
            trie: Mutex::new(trie),
            cache,
            ss_roster,
            clients: DashMap::new(),
            next_ss_id: AtomicU32::new(next_id),
            persistence,
            config,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        self.config.probe_timeout()
    }

    pub fn dial_timeout(&self) -> Duration {
        self.config.dial_timeout()
    }

    /// Persists the current in-memory state to disk.
    pub fn persist(&self) {
        let files: Vec<FileRecord> = self.files.iter().map(|e| e.value().clone()).collect();
        let ss_records: Vec<SsRecord> = self.ss_roster.iter().map(|e| e.value().clone()).collect();
        self.persistence.save(&persistence::Snapshot { files, ss_records });
    }

    /// Filename lookup through the 60-second search cache (spec.md §3):
    /// a cache hit avoids touching the `files` map; a miss populates the
    /// cache from it.
    pub fn lookup_cached(&self, filename: &str) -> Option<FileRecord> {
        if let Some(hit) = self.cache.get(filename) {
            return Some(hit);
        }
        let file = self.files.get(filename)?.clone();
        self.cache.insert(filename.to_string(), file.clone());
        Some(file)
    }

    /// Invalidates a single filename's cache entry; called by every
    /// handler that mutates a `FileRecord` in place so a stale ACL/owner
    /// view can't survive the 60-second TTL.
    pub fn invalidate_cache(&self, filename: &str) {
        self.cache.invalidate(filename);
    }

    /// Deletes every trace of `filename` from the namespace, roster claims,
    /// and lookup cache.
    pub fn purge(&self, filename: &str) {
        self.files.remove(filename);
        self.trie.lock().unwrap().remove(filename);
        for mut ss in self.ss_roster.iter_mut() {
            ss.claimed_files.remove(filename);
        }
        self.cache.invalidate(filename);
        self.persist();
    }

    /// Registers (or reactivates) a storage server. Returns `(ss_id,
    /// was_previously_inactive)`.
    pub fn register_ss(&self, ip: IpAddr, nm_port: u16, client_port: u16) -> Result<(SsId, bool), &'static str> {
        for mut entry in self.ss_roster.iter_mut() {
            if entry.ip == ip && entry.nm_port == nm_port && entry.client_port == client_port {
                let was_inactive = !entry.active;
                entry.active = true;
                return Ok((entry.ss_id, was_inactive));
            }
        }

        if self.ss_roster.len() >= MAX_SS {
            return Err("maximum storage servers reached");
        }

        let ss_id = self.next_ss_id.fetch_add(1, Ordering::SeqCst);
        self.ss_roster.insert(
            ss_id,
            SsRecord {
                ss_id,
                ip,
                nm_port,
                client_port,
                active: true,
                claimed_files: Default::default(),
            },
        );
        Ok((ss_id, false))
    }

    pub fn register_client(&self, username: &str, ip: IpAddr, port: u16) {
        self.clients
            .entry(username.to_string())
            .and_modify(|c| {
                c.ip = ip;
                c.port = port;
                c.active = true;
            })
            .or_insert(ClientRecord { username: username.to_string(), ip, port, active: true });
    }

    pub fn mark_client_inactive(&self, username: &str) {
        if let Some(mut c) = self.clients.get_mut(username) {
            c.active = false;
        }
    }

    /// Active storage servers ordered by `ss_id`, used to compute
    /// replication partners.
    pub fn active_ss_ordered(&self) -> Vec<SsRecord> {
        let mut v: Vec<SsRecord> = self
            .ss_roster
            .iter()
            .filter(|e| e.active)
            .map(|e| e.value().clone())
            .collect();
        v.sort_by_key(|s| s.ss_id);
        v
    }

    /// The SS that would be picked as a file's replica partner for
    /// `primary_id` — the next active SS in id order, wrapping, skipping
    /// `primary_id` itself.
    pub fn next_active_after(&self, primary_id: SsId) -> Option<SsEndpoint> {
        let active = self.active_ss_ordered();
        if active.len() < 2 {
            return None;
        }
        let pos = active.iter().position(|s| s.ss_id == primary_id)?;
        let partner = &active[(pos + 1) % active.len()];
        if partner.ss_id == primary_id {
            return None;
        }
        Some(partner.endpoint())
    }

    /// Re-announces each active storage server's replication partner.
    /// Called after a storage server joins or returns so every active SS
    /// always has an up-to-date `SS_ACK` view of who to replicate to.
    pub async fn broadcast_partners(&self) {
        let active = self.active_ss_ordered();
        if active.len() < 2 {
            return;
        }
        for ss in &active {
            let Some(partner) = self.next_active_after(ss.ss_id) else { continue };
            let data = format!("{} {}", partner.ip, partner.client_port);
            let ack = crate::wire::Record::request(crate::wire::OpCode::SsAck, "NM", "").with_data(data);
            ss_link::call(ss.control_addr(), &ack, self.probe_timeout()).await;
        }
    }
}
