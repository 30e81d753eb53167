//! Name server metadata persistence: the namespace and storage-server
//! roster are serialized as a single structured snapshot through `serde` +
//! `toml`, the same pair the config loader uses. A corrupt or
//! sanity-failing snapshot resets to empty and is immediately rewritten.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ns::state::{FileRecord, SsRecord};

/// Hard caps checked on load.
const MAX_FILES: usize = 1_000_000;
const MAX_SS: usize = 10_000;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub files: Vec<FileRecord>,
    pub ss_records: Vec<SsRecord>,
}

impl Snapshot {
    fn sane(&self) -> bool {
        if self.files.len() > MAX_FILES || self.ss_records.len() > MAX_SS {
            return false;
        }
        for f in &self.files {
            if f.filename.is_empty() || f.owner.is_empty() {
                return false;
            }
            if f.acl.len() > crate::ns::MAX_ACL_ENTRIES || f.pending_requests.len() > crate::ns::MAX_PENDING_REQUESTS {
                return false;
            }
        }
        for s in &self.ss_records {
            if s.ss_id as usize > MAX_SS {
                return false;
            }
        }
        true
    }

    /// Collapses duplicate filenames, keeping the last occurrence, and
    /// heals any zero timestamp left by a hand-edited or partially written
    /// snapshot by stamping it to the current time.
    fn dedup(mut self) -> Self {
        use std::collections::HashMap;
        let mut by_name: HashMap<String, FileRecord> = HashMap::new();
        for mut f in self.files.drain(..) {
            let now = crate::ns::state::now_secs();
            if f.created_time == 0 {
                f.created_time = now;
            }
            if f.modified_time == 0 {
                f.modified_time = now;
            }
            if f.accessed_time == 0 {
                f.accessed_time = now;
            }
            by_name.insert(f.filename.clone(), f);
        }
        self.files = by_name.into_values().collect();
        self
    }
}

pub struct PersistenceHandle {
    path: PathBuf,
}

impl PersistenceHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the snapshot, resetting to empty on any validation failure.
    pub fn load(&self) -> Snapshot {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Snapshot::default();
        };

        let snapshot: Snapshot = match toml::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "corrupt NS snapshot, resetting");
                let empty = Snapshot::default();
                self.save(&empty);
                return empty;
            }
        };

        if !snapshot.sane() {
            tracing::warn!(path = %self.path.display(), "NS snapshot failed sanity checks, resetting");
            let empty = Snapshot::default();
            self.save(&empty);
            return empty;
        }

        let deduped = snapshot.dedup();
        self.save(&deduped);
        deduped
    }

    /// Persists `snapshot` via a temp-file-then-rename, atomic with respect
    /// to concurrent readers.
    pub fn save(&self, snapshot: &Snapshot) {
        let Ok(serialized) = toml::to_string_pretty(snapshot) else {
            tracing::error!("failed to serialize NS snapshot");
            return;
        };

        let tmp = tmp_path(&self.path);
        if let Err(e) = std::fs::write(&tmp, serialized) {
            tracing::error!(error = %e, "failed to write NS snapshot tmp file");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            tracing::error!(error = %e, "failed to rename NS snapshot into place");
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns::state::{Access, SsEndpoint};
    use std::collections::HashMap;

    fn endpoint() -> SsEndpoint {
        SsEndpoint { ss_id: 0, ip: "127.0.0.1".parse().unwrap(), client_port: 9101 }
    }

    #[test]
    fn round_trips_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns_state.toml");
        let handle = PersistenceHandle::new(&path);

        let mut record = FileRecord::new("doc.txt".into(), "alice".into(), endpoint(), None);
        record.acl.insert("bob".into(), Access::Read);

        let dup = FileRecord::new("doc.txt".into(), "alice".into(), endpoint(), None);

        let snapshot = Snapshot { files: vec![record, dup], ss_records: vec![] };
        handle.save(&snapshot);

        let loaded = handle.load();
        assert_eq!(loaded.files.len(), 1);
        let _ = HashMap::<String, Access>::new();
    }

    #[test]
    fn corrupt_file_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns_state.toml");
        std::fs::write(&path, "not valid toml {{{").unwrap();

        let handle = PersistenceHandle::new(&path);
        let loaded = handle.load();
        assert!(loaded.files.is_empty());
        assert!(loaded.ss_records.is_empty());
    }

    #[test]
    fn missing_file_is_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let handle = PersistenceHandle::new(&path);
        let loaded = handle.load();
        assert!(loaded.files.is_empty());
    }
}
