//! On-disk file storage under a single root directory: path sanitization,
//! read/write/delete, and the startup scan that rebuilds lock bookkeeping
//! for files already present from a previous run.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SsError;

const META_SUFFIX: &str = ".meta";

fn meta_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Store { root })
    }

    /// Maps a client-supplied filename to a path under `root`, rejecting
    /// anything that could escape it.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, SsError> {
        if filename.is_empty() || filename.starts_with('/') || filename.split('/').any(|seg| seg == "..") {
            return Err(SsError::InvalidIndex(format!("unsafe filename: {filename}")));
        }
        Ok(self.root.join(filename))
    }

    pub fn create(&self, filename: &str) -> Result<(), SsError> {
        let path = self.resolve(filename)?;
        if path.exists() {
            return Err(SsError::FileExists);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, b"")?;
        let created = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        std::fs::write(meta_path(&path), format!("created={created}\n")).ok();
        Ok(())
    }

    pub fn delete(&self, filename: &str) -> Result<(), SsError> {
        let path = self.resolve(filename)?;
        std::fs::remove_file(&path)?;
        std::fs::remove_file(meta_path(&path)).ok();
        Ok(())
    }

    pub fn read(&self, filename: &str) -> Result<String, SsError> {
        let path = self.resolve(filename)?;
        Ok(std::fs::read_to_string(&path)?)
    }

    pub fn save(&self, filename: &str, content: &str) -> Result<(), SsError> {
        let path = self.resolve(filename)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.resolve(filename).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn create_folder(&self, folder: &str) -> Result<(), SsError> {
        let path = self.resolve(folder)?;
        std::fs::create_dir_all(&path)?;
        Ok(())
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<(), SsError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&src, &dst)?;
        std::fs::rename(meta_path(&src), meta_path(&dst)).ok();
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file under `root`, relative to it, for the startup
    /// scan that rebuilds lock bookkeeping after a restart.
    pub fn scan_existing(&self) -> Vec<String> {
        let mut out = Vec::new();
        walk(&self.root, &self.root, &mut out);
        out
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else { continue };
        if file_type.is_dir() {
            // A leading-dot directory (e.g. `.checkpoints`) is sidecar
            // bookkeeping, not document content, and must not be scanned
            // back in as a claimed file after a restart.
            if path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.')) {
                continue;
            }
            walk(root, &path, out);
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        if path.extension().is_some_and(|ext| ext == "meta") {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else { continue };
        let Some(rel) = rel.to_str() else { continue };
        out.push(rel.replace('\\', "/"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        assert!(store.resolve("../outside.txt").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("a/../../b").is_err());
    }

    #[test]
    fn create_read_save_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.create("doc.txt").unwrap();
        assert_eq!(store.read("doc.txt").unwrap(), "");
        store.save("doc.txt", "Hello world.").unwrap();
        assert_eq!(store.read("doc.txt").unwrap(), "Hello world.");
        store.delete("doc.txt").unwrap();
        assert!(!store.exists("doc.txt"));
    }

    #[test]
    fn scan_existing_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.create_folder("notes").unwrap();
        store.create("notes/a.txt").unwrap();
        store.create("root.txt").unwrap();

        let mut found = store.scan_existing();
        found.sort();
        assert_eq!(found, vec!["notes/a.txt", "root.txt"]);
    }

    #[test]
    fn scan_existing_skips_nested_checkpoint_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.create("doc.txt").unwrap();
        let ckpt_dir = dir.path().join(".checkpoints").join("doc.txt");
        std::fs::create_dir_all(&ckpt_dir).unwrap();
        std::fs::write(ckpt_dir.join("v1"), "Hello.").unwrap();

        assert_eq!(store.scan_existing(), vec!["doc.txt"]);
    }
}
