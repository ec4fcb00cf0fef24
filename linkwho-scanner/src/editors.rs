use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Mutex;

/// An editor scoped to the site they edited on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EditorKey {
    pub site: String,
    pub editor: String,
}

impl EditorKey {
    pub fn new(site: impl Into<String>, editor: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            editor: editor.into(),
        }
    }
}

impl fmt::Display for EditorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.site, self.editor)
    }
}

/// Thread-safe collector of distinct editors discovered while crawling
#[derive(Debug, Default)]
pub struct EditorSet {
    keys: Mutex<HashSet<EditorKey>>,
}

impl EditorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an editor. Empty names are ignored. Returns true if the pair is new.
    pub fn add(&self, site: &str, editor: &str) -> bool {
        if editor.is_empty() {
            return false;
        }

        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.insert(EditorKey::new(site, editor))
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct pairs seen so far, sorted. Call once every producer has finished.
    pub fn finalize(&self) -> BTreeSet<EditorKey> {
        let keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_duplicates_collapse() {
        let set = EditorSet::new();
        assert!(set.add("en", "Alice"));
        assert!(!set.add("en", "Alice"));
        assert!(set.add("de", "Alice"));
        assert!(set.add("en", "alice"));

        let keys = set.finalize();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&EditorKey::new("de", "Alice")));
    }

    #[test]
    fn test_empty_editor_is_ignored() {
        let set = EditorSet::new();
        assert!(!set.add("en", ""));
        assert!(set.is_empty());
    }

    #[test]
    fn test_concurrent_inserts_yield_each_pair_once() {
        let set = Arc::new(EditorSet::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let set = set.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        set.add(if i % 2 == 0 { "en" } else { "fr" }, &format!("user{}", i % 10));
                        set.add("en", &format!("worker{}", worker % 4));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // user0..user9 split across two sites by parity, plus worker0..worker3
        let keys = set.finalize();
        assert_eq!(keys.len(), 10 + 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(EditorKey::new("en", "Alice").to_string(), "en:Alice");
    }
}
