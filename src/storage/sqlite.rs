use super::{RegistryStore, RegistryTransaction, StoreResult};
use crate::types::{CategoryReference, Registration};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS category_references (
        category_code TEXT PRIMARY KEY,
        variety       TEXT NOT NULL,
        block         TEXT NOT NULL,
        size          TEXT,
        stem_count    INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS registrations (
        barcode       TEXT PRIMARY KEY,
        category_code TEXT NOT NULL,
        serial        TEXT NOT NULL,
        variety       TEXT NOT NULL,
        block         TEXT NOT NULL,
        size          TEXT,
        stem_count    INTEGER NOT NULL,
        stage         TEXT NOT NULL,
        registered_at TEXT NOT NULL
    );
"#;

/// File-backed SQLite store. Every transaction gets its own connection, so
/// concurrent registrations only meet inside SQLite's write lock.
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and make sure the tables exist
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { path, busy_timeout };
        let conn = store.connect()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened registration store at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl RegistryStore for SqliteStore {
    fn begin(&self) -> StoreResult<Box<dyn RegistryTransaction>> {
        let conn = self.connect()?;
        // Take the write lock up front so concurrent scans of the same barcode queue
        // behind each other instead of failing on lock upgrade.
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }

    fn upsert_category(&self, category: &CategoryReference) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO category_references (category_code, variety, block, size, stem_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(category_code) DO UPDATE SET
               variety = excluded.variety,
               block = excluded.block,
               size = excluded.size,
               stem_count = excluded.stem_count",
            params![
                category.category_code,
                category.variety,
                category.block,
                category.size,
                category.stem_count
            ],
        )?;
        debug!("Upserted category reference {}", category.category_code);
        Ok(())
    }

    fn find_registration(&self, barcode: &str) -> StoreResult<Option<Registration>> {
        let conn = self.connect()?;
        let registration = conn
            .query_row(
                "SELECT barcode, category_code, serial, variety, block, size, stem_count, stage, registered_at
                 FROM registrations WHERE barcode = ?1",
                params![barcode],
                map_registration,
            )
            .optional()?;
        Ok(registration)
    }
}

struct SqliteTransaction {
    conn: Connection,
    finished: bool,
}

impl RegistryTransaction for SqliteTransaction {
    fn find_category(&mut self, category_code: &str) -> StoreResult<Option<CategoryReference>> {
        let category = self
            .conn
            .query_row(
                "SELECT category_code, variety, block, size, stem_count
                 FROM category_references WHERE category_code = ?1",
                params![category_code],
                map_category,
            )
            .optional()?;
        Ok(category)
    }

    fn insert_if_absent(&mut self, registration: &Registration) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "INSERT INTO registrations
               (barcode, category_code, serial, variety, block, size, stem_count, stage, registered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(barcode) DO NOTHING",
            params![
                registration.barcode,
                registration.category_code,
                registration.serial,
                registration.variety,
                registration.block,
                registration.size,
                registration.stem_count,
                registration.stage,
                registration.registered_at
            ],
        )?;
        Ok(changed > 0)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back abandoned transaction: {}", e);
            }
        }
    }
}

fn map_category(row: &Row<'_>) -> rusqlite::Result<CategoryReference> {
    Ok(CategoryReference {
        category_code: row.get(0)?,
        variety: row.get(1)?,
        block: row.get(2)?,
        size: row.get(3)?,
        stem_count: row.get(4)?,
    })
}

fn map_registration(row: &Row<'_>) -> rusqlite::Result<Registration> {
    Ok(Registration {
        barcode: row.get(0)?,
        category_code: row.get(1)?,
        serial: row.get(2)?,
        variety: row.get(3)?,
        block: row.get(4)?,
        size: row.get(5)?,
        stem_count: row.get(6)?,
        stage: row.get(7)?,
        registered_at: row.get(8)?,
    })
}
