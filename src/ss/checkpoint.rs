//! Named checkpoints: a saved copy of a file's content under
//! `<checkpoint_root>/<filename>/<tag>`, readable, listable, and
//! revertible independently of the live content.

use std::path::PathBuf;

use crate::error::SsError;

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CheckpointStore { root: root.into() }
    }

    fn dir_for(&self, filename: &str) -> Result<PathBuf, SsError> {
        if filename.split('/').any(|seg| seg == "..") {
            return Err(SsError::InvalidIndex(format!("unsafe filename: {filename}")));
        }
        Ok(self.root.join(filename))
    }

    fn path_for(&self, filename: &str, tag: &str) -> Result<PathBuf, SsError> {
        if tag.is_empty() || tag.contains('/') || tag == "." || tag == ".." {
            return Err(SsError::InvalidIndex(format!("invalid checkpoint tag: {tag}")));
        }
        Ok(self.dir_for(filename)?.join(tag))
    }

    pub fn create(&self, filename: &str, tag: &str, content: &str) -> Result<(), SsError> {
        let path = self.path_for(filename, tag)?;
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn read(&self, filename: &str, tag: &str) -> Result<String, SsError> {
        let path = self.path_for(filename, tag)?;
        std::fs::read_to_string(&path).map_err(|_| SsError::FileNotFound)
    }

    pub fn list(&self, filename: &str) -> Result<Vec<String>, SsError> {
        let dir = self.dir_for(filename)?;
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Ok(Vec::new());
        };
        let mut tags: Vec<String> = entries
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        tags.sort();
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_read_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.create("doc.txt", "v1", "Hello.").unwrap();
        store.create("doc.txt", "v2", "Hello world.").unwrap();

        assert_eq!(store.read("doc.txt", "v1").unwrap(), "Hello.");
        assert_eq!(store.list("doc.txt").unwrap(), vec!["v1", "v2"]);
    }

    #[test]
    fn missing_checkpoint_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(matches!(store.read("doc.txt", "nope"), Err(SsError::FileNotFound)));
    }

    #[test]
    fn listing_unknown_file_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert_eq!(store.list("never-created.txt").unwrap(), Vec::<String>::new());
    }
}
