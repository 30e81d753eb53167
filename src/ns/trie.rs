//! Prefix trie over `/`-separated filename segments, backing the
//! namespace's membership test and folder ("prefix") enumeration.

use std::collections::HashMap;

#[derive(Default)]
struct Node {
    children: HashMap<String, Node>,
    /// Present at a terminal node that names an actual file.
    terminal: bool,
}

/// Stores the set of known filenames and supports prefix ("folder")
/// enumeration without touching the NS's file table directly.
#[derive(Default)]
pub struct FileTrie {
    root: Node,
}

fn segments(filename: &str) -> impl Iterator<Item = &str> {
    filename.split('/').filter(|s| !s.is_empty())
}

impl FileTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: &str) {
        let mut node = &mut self.root;
        for seg in segments(filename) {
            node = node.children.entry(seg.to_string()).or_default();
        }
        node.terminal = true;
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.find(filename).map(|n| n.terminal).unwrap_or(false)
    }

    pub fn remove(&mut self, filename: &str) {
        Self::remove_rec(&mut self.root, &segments(filename).collect::<Vec<_>>());
    }

    fn remove_rec(node: &mut Node, segs: &[&str]) -> bool {
        match segs.split_first() {
            None => {
                node.terminal = false;
            }
            Some((head, rest)) => {
                if let Some(child) = node.children.get_mut(*head) {
                    if Self::remove_rec(child, rest) {
                        node.children.remove(*head);
                    }
                }
            }
        }
        !node.terminal && node.children.is_empty()
    }

    fn find(&self, filename: &str) -> Option<&Node> {
        let mut node = &self.root;
        for seg in segments(filename) {
            node = node.children.get(seg)?;
        }
        Some(node)
    }

    /// Lists every filename under `folder/` (folder itself excluded).
    pub fn list_prefix(&self, folder: &str) -> Vec<String> {
        let mut out = Vec::new();
        let Some(node) = self.find(folder) else {
            return out;
        };
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{folder}/")
        };
        Self::collect(node, &prefix, &mut out);
        out
    }

    fn collect(node: &Node, prefix: &str, out: &mut Vec<String>) {
        if node.terminal && !prefix.is_empty() {
            out.push(prefix.trim_end_matches('/').to_string());
        }
        for (seg, child) in &node.children {
            let next = format!("{prefix}{seg}/");
            Self::collect(child, &next, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_find_remove() {
        let mut trie = FileTrie::new();
        trie.insert("docs/a.txt");
        trie.insert("docs/b.txt");
        trie.insert("root.txt");

        assert!(trie.contains("docs/a.txt"));
        assert!(trie.contains("root.txt"));
        assert!(!trie.contains("docs"));

        let mut under_docs = trie.list_prefix("docs");
        under_docs.sort();
        assert_eq!(under_docs, vec!["docs/a.txt", "docs/b.txt"]);

        trie.remove("docs/a.txt");
        assert!(!trie.contains("docs/a.txt"));
        assert!(trie.contains("docs/b.txt"));
    }
}
