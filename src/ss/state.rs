//! Per-file lock and undo bookkeeping. Each file gets one
//! `tokio::sync::Mutex`-guarded [`FileState`], so a WRITE/LOCK_SENTENCE/
//! UNLOCK_SENTENCE/UNDO sequence on one file never interleaves with
//! another on the same file while leaving unrelated files unaffected.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

pub const MAX_LOCKS_PER_FILE: usize = 100;

#[derive(Debug, Default)]
pub struct FileState {
    /// sentence_number -> the username holding its lock.
    pub sentence_locks: HashMap<i32, String>,
    pub undo_content: Option<String>,
}

impl FileState {
    pub fn locked_by(&self, sentence_number: i32) -> Option<&str> {
        self.sentence_locks.get(&sentence_number).map(String::as_str)
    }
}

/// Registry of per-file states, created lazily on first touch (including
/// at startup, for files discovered already on disk).
#[derive(Default)]
pub struct FileRegistry {
    files: DashMap<String, Arc<Mutex<FileState>>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, filename: &str) -> Arc<Mutex<FileState>> {
        self.files.entry(filename.to_string()).or_default().clone()
    }

    pub fn remove(&self, filename: &str) {
        self.files.remove(filename);
    }

    pub fn rename(&self, from: &str, to: &str) {
        if let Some((_, state)) = self.files.remove(from) {
            self.files.insert(to.to_string(), state);
        }
    }

    pub fn touch(&self, filename: &str) {
        self.files.entry(filename.to_string()).or_default();
    }
}
