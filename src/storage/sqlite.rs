use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::Record;
use crate::errors::StorageError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT,
        image_path TEXT,
        timestamp TEXT
    );
";

/// SQLite-backed record log. Holds only the database path: each operation
/// opens its own connection and closes it before returning.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    path: PathBuf,
}

impl SqliteRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Create the `records` table if it does not exist yet. Safe on every start.
    pub fn initialize(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Append a record and return its id.
    pub fn insert(
        &self,
        text: Option<&str>,
        image_path: Option<&str>,
        timestamp: &str,
    ) -> Result<i64, StorageError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO records (text, image_path, timestamp) VALUES (?1, ?2, ?3)",
            params![text, image_path, timestamp],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Every record, newest first.
    pub fn list_all(&self) -> Result<Vec<Record>, StorageError> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT id, text, image_path, timestamp FROM records ORDER BY id DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Record {
                id: row.get(0)?,
                text: row.get(1)?,
                image_path: row.get(2)?,
                timestamp: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
