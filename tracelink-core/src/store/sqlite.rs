//! SQLite entity store backend
//!
//! Entities live as JSON documents in a single table keyed by (kind, id).
//! Scope-node updates are a compare-and-swap on the version column, so a
//! concurrent writer from another process cannot cause a lost update.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use super::{Entity, EntityStore};
use crate::models::ScopeNode;
use crate::registry::EntityKind;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Attempts before a contended compare-and-swap gives up
const CAS_MAX_RETRIES: u32 = 16;

/// SQLite-backed entity store
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        // WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let store = Self {
            path,
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Returns the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let current_version: i32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        if current_version == 0 {
            conn.execute_batch(include_str!("schema.sql"))?;
        } else if current_version < SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is outdated, expected {}",
                current_version,
                SCHEMA_VERSION
            );
        }
        Ok(())
    }

    fn decode(kind: EntityKind, json: &str) -> Result<Entity> {
        serde_json::from_str(json)
            .with_context(|| format!("Failed to deserialize stored {} entity", kind))
    }
}

impl EntityStore for SqliteStore {
    fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row(
                "SELECT data FROM entities WHERE kind = ?1 AND id = ?2",
                params![kind.tag(), id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(Self::decode(kind, &json)?)),
            None => Ok(None),
        }
    }

    fn filter(&self, kind: EntityKind, pred: &dyn Fn(&Entity) -> bool) -> Result<Vec<Entity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT data FROM entities WHERE kind = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(params![kind.tag()], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for json in rows {
            let entity = Self::decode(kind, &json?)?;
            if pred(&entity) {
                out.push(entity);
            }
        }
        Ok(out)
    }

    fn insert(&self, entity: Entity) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let json = serde_json::to_string(&entity).context("Failed to serialize entity")?;
        conn.execute(
            "INSERT INTO entities (kind, id, version, data) VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(kind, id) DO UPDATE SET data = excluded.data",
            params![entity.kind().tag(), entity.id().to_string(), json],
        )?;
        Ok(())
    }

    fn update_scope_node(
        &self,
        id: Uuid,
        apply: &dyn Fn(&mut ScopeNode),
    ) -> Result<Option<ScopeNode>> {
        let kind_tag = EntityKind::ScopeNode.tag();
        for _ in 0..CAS_MAX_RETRIES {
            let current: Option<(String, i64)> = {
                let conn = self.conn.lock().unwrap();
                conn.query_row(
                    "SELECT data, version FROM entities WHERE kind = ?1 AND id = ?2",
                    params![kind_tag, id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
            };

            let (json, stored_version) = match current {
                Some(row) => row,
                None => return Ok(None),
            };
            let entity = Self::decode(EntityKind::ScopeNode, &json)?;
            let mut node = match entity.as_scope_node() {
                Some(node) => node.clone(),
                None => return Ok(None),
            };

            apply(&mut node);
            node.version = (stored_version as u64) + 1;

            let updated_json = serde_json::to_string(&Entity::ScopeNode(node.clone()))
                .context("Failed to serialize scope node")?;
            let changed = {
                let conn = self.conn.lock().unwrap();
                conn.execute(
                    "UPDATE entities SET data = ?1, version = ?2
                     WHERE kind = ?3 AND id = ?4 AND version = ?5",
                    params![
                        updated_json,
                        node.version as i64,
                        kind_tag,
                        id.to_string(),
                        stored_version
                    ],
                )?
            };
            if changed == 1 {
                return Ok(Some(node));
            }
            // Version moved under us; reload and retry
        }
        anyhow::bail!("Gave up updating scope node {} after contended retries", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FitStatus, ScopeLevel};
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("trace.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_insert_get_round_trip() {
        let (_dir, store) = open_store();
        let node = ScopeNode::new(ScopeLevel::L3, "SI-20", "Scope Item", Uuid::new_v4(), Uuid::new_v4());
        store.insert(Entity::ScopeNode(node.clone())).unwrap();

        let fetched = store.get(EntityKind::ScopeNode, node.id).unwrap().unwrap();
        assert_eq!(fetched.id(), node.id);
        assert!(store
            .get(EntityKind::Requirement, node.id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_insert_replaces_existing_row() {
        let (_dir, store) = open_store();
        let mut node = ScopeNode::new(ScopeLevel::L4, "ST-20", "First", Uuid::new_v4(), Uuid::new_v4());
        store.insert(Entity::ScopeNode(node.clone())).unwrap();
        node.name = "Second".to_string();
        store.insert(Entity::ScopeNode(node.clone())).unwrap();

        let all = store.filter(EntityKind::ScopeNode, &|_| true).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].title().contains("Second"));
    }

    #[test]
    fn test_update_scope_node_cas_bumps_version() {
        let (_dir, store) = open_store();
        let node = ScopeNode::new(ScopeLevel::L4, "ST-21", "Step", Uuid::new_v4(), Uuid::new_v4());
        store.insert(Entity::ScopeNode(node.clone())).unwrap();

        let first = store
            .update_scope_node(node.id, &|n| n.fit_status = Some(FitStatus::Fit))
            .unwrap()
            .unwrap();
        assert_eq!(first.version, 1);

        let second = store
            .update_scope_node(node.id, &|n| n.fit_status = Some(FitStatus::Gap))
            .unwrap()
            .unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.fit_status, Some(FitStatus::Gap));
    }

    #[test]
    fn test_update_missing_node_is_none() {
        let (_dir, store) = open_store();
        assert!(store
            .update_scope_node(Uuid::new_v4(), &|_| {})
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_reopen_preserves_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.db");
        let node = ScopeNode::new(ScopeLevel::L1, "FIN", "Finance", Uuid::new_v4(), Uuid::new_v4());
        {
            let store = SqliteStore::new(&path).unwrap();
            store.insert(Entity::ScopeNode(node.clone())).unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert!(store.get(EntityKind::ScopeNode, node.id).unwrap().is_some());
    }
}
