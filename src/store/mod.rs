//! In-memory storage collaborator.
//!
//! The [`Graph`] holds every entity; [`Store`] wraps it behind a lock and runs
//! each mutation as an all-or-nothing transaction over a working copy.

mod graph;

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use anyhow::Context;
use log::{debug, info, warn};

pub use graph::Graph;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct Store {
    graph: RwLock<Graph>,
}

impl Store {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph: RwLock::new(graph),
        }
    }

    /// Shared read access to the committed graph.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Graph>> {
        self.graph
            .read()
            .map_err(|_| Error::Transaction("store lock poisoned".to_string()))
    }

    /// Run `f` against a copy of the graph and commit only if it succeeds.
    ///
    /// On error the committed graph is unchanged and the error is returned.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Graph) -> Result<T>,
    {
        let mut committed = self
            .graph
            .write()
            .map_err(|_| Error::Transaction("store lock poisoned".to_string()))?;
        let mut working = committed.clone();
        match f(&mut working) {
            Ok(value) => {
                *committed = working;
                Ok(value)
            }
            Err(e) => {
                debug!("Rolled back transaction: {e}");
                Err(e)
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let graph: Graph = serde_json::from_str(&content)?;
        info!("Loaded snapshot {}", path.display());
        Ok(Self::new(graph))
    }

    /// Load `path`, or start empty when the file does not exist yet.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!(
                "Snapshot {} not found, starting with an empty store",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path).with_context(|| format!("Failed to load snapshot {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let graph = self.read()?;
        let content = serde_json::to_string_pretty(&*graph)?;
        std::fs::write(path, content)?;
        debug!("Saved snapshot {}", path.display());
        Ok(())
    }
}

/// `<dir>/license-ledger.json`, the snapshot used when none is given.
pub fn default_snapshot_path(dir: &Path) -> PathBuf {
    dir.join("license-ledger.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{License, Library, LibraryType};
    use tempfile::NamedTempFile;

    #[test]
    fn failed_transaction_leaves_graph_untouched() {
        let store = Store::default();
        let result: Result<()> = store.transaction(|graph| {
            graph.create_license(License::new("MIT", "MIT License"))?;
            graph.create_license(License::new("mit", "duplicate"))?;
            Ok(())
        });
        assert!(matches!(result, Err(Error::Duplicate { .. })));
        assert_eq!(store.read().unwrap().licenses().count(), 0);
    }

    #[test]
    fn committed_transaction_is_visible() {
        let store = Store::default();
        let id = store
            .transaction(|graph| graph.create_license(License::new("MIT", "MIT License")))
            .unwrap();
        assert_eq!(
            store.read().unwrap().license(id).unwrap().short_identifier,
            "MIT"
        );
    }

    #[test]
    fn snapshot_round_trip_keeps_ids_and_sequence() {
        let store = Store::default();
        let lib = store
            .transaction(|graph| {
                graph.create_library(
                    Library::new(LibraryType::Npm, "", "left-pad", "1.3.0")
                        .with_original_license("MIT"),
                )
            })
            .unwrap();

        let file = NamedTempFile::new().unwrap();
        store.save(file.path()).unwrap();
        let loaded = Store::load(file.path()).unwrap();

        assert_eq!(loaded.read().unwrap().library(lib).unwrap().name, "left-pad");
        let next = loaded
            .transaction(|graph| graph.create_license(License::new("MIT", "MIT License")))
            .unwrap();
        assert!(next.0 > lib.0);
    }

    #[test]
    fn open_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&default_snapshot_path(dir.path())).unwrap();
        assert_eq!(store.read().unwrap().libraries().count(), 0);
    }
}
