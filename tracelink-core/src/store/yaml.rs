//! YAML file storage backend
//!
//! Stores the whole snapshot in one YAML file, the way small single-team
//! projects keep their data next to the repo. Reads load the full file;
//! writes re-read, mutate and save under an fs2 exclusive lock so two
//! processes cannot interleave a read-modify-write on the same node.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use super::{Entity, EntityStore, MemoryStore, Snapshot};
use crate::models::ScopeNode;
use crate::registry::EntityKind;

/// File-backed entity store
pub struct YamlStore {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl YamlStore {
    /// Creates a store over the given file; the file is created on first save
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let lock_file_path = file_path.with_extension("yaml.lock");
        Self {
            file_path,
            lock_file_path,
        }
    }

    /// Returns the path to the data file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Creates the file with an empty snapshot if it doesn't exist
    pub fn create_if_not_exists(&self) -> Result<()> {
        if !self.file_path.exists() {
            self.save(&Snapshot::new())?;
        }
        Ok(())
    }

    /// Loads the full snapshot from disk
    pub fn load(&self) -> Result<Snapshot> {
        if !self.file_path.exists() {
            return Ok(Snapshot::new());
        }
        let content = fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read data file: {:?}", self.file_path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {:?}", self.file_path))
    }

    /// Saves a snapshot under an exclusive lock
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock_file = self.acquire_write_lock()?;
        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        let yaml = serde_yaml::to_string(snapshot)?;
        fs::write(&self.file_path, yaml)?;
        // Lock is released when lock_file is dropped
        Ok(())
    }

    /// Acquire an exclusive lock for writing, with a bounded wait
    fn acquire_write_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to create lock file: {:?}", self.lock_file_path))?;

        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(5);
        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > timeout {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another process may be writing: {:?}",
                            self.file_path
                        );
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to acquire lock on {:?}", self.lock_file_path)
                    })
                }
            }
        }
    }

    fn in_memory(&self) -> Result<MemoryStore> {
        Ok(MemoryStore::from_snapshot(self.load()?))
    }
}

impl EntityStore for YamlStore {
    fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>> {
        self.in_memory()?.get(kind, id)
    }

    fn filter(&self, kind: EntityKind, pred: &dyn Fn(&Entity) -> bool) -> Result<Vec<Entity>> {
        self.in_memory()?.filter(kind, pred)
    }

    fn insert(&self, entity: Entity) -> Result<()> {
        let mut lock_file = self.acquire_write_lock()?;
        let _ = writeln!(lock_file, "Locked by PID {}", std::process::id());

        let memory = MemoryStore::from_snapshot(self.load()?);
        memory.insert(entity)?;
        let yaml = serde_yaml::to_string(&memory.to_snapshot())?;
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.file_path, yaml)?;
        Ok(())
    }

    fn update_scope_node(
        &self,
        id: Uuid,
        apply: &dyn Fn(&mut ScopeNode),
    ) -> Result<Option<ScopeNode>> {
        // Re-read inside the lock so the mutation applies to the latest row
        let mut lock_file = self.acquire_write_lock()?;
        let _ = writeln!(lock_file, "Locked by PID {}", std::process::id());

        let memory = MemoryStore::from_snapshot(self.load()?);
        let updated = memory.update_scope_node(id, apply)?;
        if updated.is_some() {
            let yaml = serde_yaml::to_string(&memory.to_snapshot())?;
            fs::write(&self.file_path, yaml)?;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FitStatus, ScopeLevel};
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_yields_empty_snapshot() {
        let dir = tempdir().unwrap();
        let store = YamlStore::new(dir.path().join("data.yaml"));
        let snapshot = store.load().unwrap();
        assert!(snapshot.scope_nodes.is_empty());
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = YamlStore::new(dir.path().join("data.yaml"));
        let node = ScopeNode::new(ScopeLevel::L3, "SI-10", "Scope Item", Uuid::new_v4(), Uuid::new_v4());
        store.insert(Entity::ScopeNode(node.clone())).unwrap();

        let fetched = store.get(EntityKind::ScopeNode, node.id).unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().id(), node.id);
    }

    #[test]
    fn test_update_scope_node_persists_and_bumps_version() {
        let dir = tempdir().unwrap();
        let store = YamlStore::new(dir.path().join("data.yaml"));
        let node = ScopeNode::new(ScopeLevel::L4, "ST-10", "Step", Uuid::new_v4(), Uuid::new_v4());
        store.insert(Entity::ScopeNode(node.clone())).unwrap();

        let updated = store
            .update_scope_node(node.id, &|n| n.fit_status = Some(FitStatus::Gap))
            .unwrap()
            .unwrap();
        assert_eq!(updated.version, 1);

        // Fresh read sees the persisted change
        let reread = store.load().unwrap();
        assert_eq!(reread.scope_nodes[0].fit_status, Some(FitStatus::Gap));
        assert_eq!(reread.scope_nodes[0].version, 1);
    }

    #[test]
    fn test_update_missing_node_does_not_write() {
        let dir = tempdir().unwrap();
        let store = YamlStore::new(dir.path().join("data.yaml"));
        store.create_if_not_exists().unwrap();
        let result = store.update_scope_node(Uuid::new_v4(), &|_| {}).unwrap();
        assert!(result.is_none());
    }
}
