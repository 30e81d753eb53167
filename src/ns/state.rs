//! Core name server data model and the concurrent collections that back
//! it. `DashMap` gives each handler its own shard instead of a single
//! coarse mutex, so storage-server RPCs are issued with no entry lock
//! held.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub type SsId = u32;

/// Access level granted to a non-owner user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// `true` if `self` satisfies a request for `other` (Write implies Read).
    pub fn satisfies(self, other: Access) -> bool {
        match other {
            Access::Read => true,
            Access::Write => self == Access::Write,
        }
    }
}

/// `(ss_id, ip, client_port)` — enough to dial a storage server's client
/// endpoint directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsEndpoint {
    pub ss_id: SsId,
    pub ip: IpAddr,
    pub client_port: u16,
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// File metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub owner: String,
    pub primary: SsEndpoint,
    pub replica: Option<SsEndpoint>,
    pub acl: HashMap<String, Access>,
    pub pending_requests: HashMap<String, Access>,
    pub created_time: u64,
    pub modified_time: u64,
    pub accessed_time: u64,
    pub last_accessed_by: Option<String>,
    pub size: u64,
    pub word_count: u64,
    pub char_count: u64,
}

impl FileRecord {
    pub fn new(filename: String, owner: String, primary: SsEndpoint, replica: Option<SsEndpoint>) -> Self {
        let now = now_secs();
        FileRecord {
            filename,
            owner,
            primary,
            replica,
            acl: HashMap::new(),
            pending_requests: HashMap::new(),
            created_time: now,
            modified_time: now,
            accessed_time: now,
            last_accessed_by: None,
            size: 0,
            word_count: 0,
            char_count: 0,
        }
    }

    /// Effective access level for `user`: owner has implicit Write (I2),
    /// otherwise whatever the ACL grants, else no access at all.
    pub fn access_for(&self, user: &str) -> Option<Access> {
        if user == self.owner {
            return Some(Access::Write);
        }
        self.acl.get(user).copied()
    }

    pub fn can_read(&self, user: &str) -> bool {
        self.access_for(user).map(|a| a.satisfies(Access::Read)).unwrap_or(false)
    }

    pub fn can_write(&self, user: &str) -> bool {
        self.access_for(user).map(|a| a.satisfies(Access::Write)).unwrap_or(false)
    }

    pub fn touch_access(&mut self, user: &str) {
        self.accessed_time = now_secs();
        self.last_accessed_by = Some(user.to_string());
    }

    pub fn touch_modify(&mut self) {
        self.modified_time = now_secs();
    }
}

/// Storage server roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsRecord {
    pub ss_id: SsId,
    pub ip: IpAddr,
    pub nm_port: u16,
    pub client_port: u16,
    pub active: bool,
    pub claimed_files: HashSet<String>,
}

impl SsRecord {
    pub fn endpoint(&self) -> SsEndpoint {
        SsEndpoint { ss_id: self.ss_id, ip: self.ip, client_port: self.client_port }
    }

    pub fn control_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.ip, self.nm_port)
    }

    pub fn client_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.ip, self.client_port)
    }
}

/// Client roster entry. Not persisted: clients
/// re-register on every process start.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub username: String,
    pub ip: IpAddr,
    pub port: u16,
    pub active: bool,
}
