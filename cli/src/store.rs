use crate::types::{CompositionRecord, NewComposition};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS compositions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    prompt TEXT,
    gpt_response TEXT,
    midi_filename TEXT,
    parent_id INTEGER,
    is_original BOOLEAN,
    FOREIGN KEY(parent_id) REFERENCES compositions(id)
)";

const SELECT_COLUMNS: &str =
    "SELECT id, prompt, gpt_response, midi_filename, parent_id, is_original FROM compositions";

pub struct CompositionStore {
    conn: Connection,
}

impl CompositionStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Database file '{}' not found.", path.display()));
        }
        Self::open(path)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .context("failed to enable foreign keys")?;
        conn.execute(SCHEMA, []).context("failed to create compositions table")?;
        Ok(Self { conn })
    }

    pub fn insert(&self, composition: &NewComposition) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO compositions
                    (prompt, gpt_response, midi_filename, parent_id, is_original)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    composition.prompt,
                    composition.gpt_response,
                    composition.midi_filename,
                    composition.parent_id,
                    composition.is_original,
                ],
            )
            .context("failed to insert composition")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list(&self) -> Result<Vec<CompositionRecord>> {
        let mut statement = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .context("failed to prepare composition listing")?;
        let rows = statement
            .query_map([], record_from_row)
            .context("failed to list compositions")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read composition row")?;
        Ok(rows)
    }

    pub fn get(&self, id: i64) -> Result<Option<CompositionRecord>> {
        self.conn
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], record_from_row)
            .optional()
            .with_context(|| format!("failed to fetch composition {id}"))
    }

    // root first
    pub fn lineage(&self, id: i64) -> Result<Vec<CompositionRecord>> {
        let mut chain = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            if chain.iter().any(|record: &CompositionRecord| record.id == current) {
                return Err(anyhow!("composition {current} has a cyclic parent chain"));
            }
            let Some(record) = self.get(current)? else {
                break;
            };
            next = record.parent_id;
            chain.push(record);
        }
        chain.reverse();
        Ok(chain)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CompositionRecord> {
    Ok(CompositionRecord {
        id: row.get(0)?,
        prompt: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        gpt_response: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        midi_filename: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        parent_id: row.get(4)?,
        is_original: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prompt: &str, parent_id: Option<i64>) -> NewComposition {
        NewComposition {
            prompt: prompt.into(),
            gpt_response: format!("{{\"prompt\": \"{prompt}\"}}"),
            midi_filename: format!("{prompt}.mid"),
            parent_id,
            is_original: parent_id.is_none(),
        }
    }

    #[test]
    fn inserts_and_lists_in_id_order() {
        let store = CompositionStore::in_memory().unwrap();
        let first = store.insert(&entry("rainy jazz", None)).unwrap();
        let second = store.insert(&entry("slower please", Some(first))).unwrap();
        assert!(second > first);

        let records = store.list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].prompt, "rainy jazz");
        assert!(records[0].is_original);
        assert_eq!(records[0].parent_id, None);
        assert_eq!(records[1].parent_id, Some(first));
        assert!(!records[1].is_original);
    }

    #[test]
    fn get_returns_none_for_unknown_id() {
        let store = CompositionStore::in_memory().unwrap();
        let id = store.insert(&entry("march", None)).unwrap();
        assert_eq!(store.get(id).unwrap().map(|r| r.midi_filename), Some("march.mid".into()));
        assert!(store.get(id + 100).unwrap().is_none());
    }

    #[test]
    fn lineage_walks_to_root() {
        let store = CompositionStore::in_memory().unwrap();
        let root = store.insert(&entry("root", None)).unwrap();
        let child = store.insert(&entry("child", Some(root))).unwrap();
        let grandchild = store.insert(&entry("grandchild", Some(child))).unwrap();
        store.insert(&entry("unrelated", None)).unwrap();

        let chain: Vec<_> =
            store.lineage(grandchild).unwrap().into_iter().map(|r| r.prompt).collect();
        assert_eq!(chain, vec!["root", "child", "grandchild"]);
        assert_eq!(store.lineage(root).unwrap().len(), 1);
        assert!(store.lineage(999).unwrap().is_empty());
    }

    #[test]
    fn rejects_dangling_parent() {
        let store = CompositionStore::in_memory().unwrap();
        assert!(store.insert(&entry("orphan", Some(42))).is_err());
    }

    #[test]
    fn open_existing_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piano_compositions.db");
        assert!(CompositionStore::open_existing(&path).is_err());

        let store = CompositionStore::open(&path).unwrap();
        store.insert(&entry("persisted", None)).unwrap();
        drop(store);

        let reopened = CompositionStore::open_existing(&path).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
    }

    #[test]
    fn reads_and_extends_database_created_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piano_compositions.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "CREATE TABLE compositions
             (id INTEGER PRIMARY KEY AUTOINCREMENT,
              prompt TEXT,
              gpt_response TEXT,
              midi_filename TEXT,
              parent_id INTEGER,
              is_original BOOLEAN,
              FOREIGN KEY(parent_id) REFERENCES compositions(id))",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO compositions (prompt, gpt_response, midi_filename, parent_id, is_original)
             VALUES ('waltz', '{}', 'original_abc.mid', NULL, 1)",
            [],
        )
        .unwrap();
        drop(conn);

        let store = CompositionStore::open_existing(&path).unwrap();
        let records = store.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].midi_filename, "original_abc.mid");
        assert!(records[0].is_original);

        let child = store.insert(&entry("faster", Some(records[0].id))).unwrap();
        let chain: Vec<_> = store.lineage(child).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(chain, vec![records[0].id, child]);
    }
}
