//! SQLite-based store implementation.

use async_trait::async_trait;
use chrono::Utc;
use filings_core::{
    Cik, FilingError, FilingMetadata, MetadataStore, Result, StatementFile, StatementKind,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

/// SQLite-based store for filing metadata and downloaded documents.
///
/// Metadata records are stored as JSON next to the columns they are queried by, so new
/// metadata fields need no schema change.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| FilingError::Store(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Creates an in-memory SQLite store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| FilingError::Store(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FilingError::Store(e.to_string()))
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS filings (
                accession_number TEXT PRIMARY KEY,
                cik INTEGER NOT NULL,
                report_date TEXT,
                data_json TEXT NOT NULL,
                stored_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| FilingError::Store(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_filings_cik_report_date
             ON filings(cik, report_date)",
            [],
        )
        .map_err(|e| FilingError::Store(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                accession_number TEXT NOT NULL,
                name TEXT NOT NULL,
                data BLOB NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (accession_number, name)
            )",
            [],
        )
        .map_err(|e| FilingError::Store(e.to_string()))?;

        debug!("SQLite store schema initialized");
        Ok(())
    }
}

fn to_json(filing: &FilingMetadata) -> Result<String> {
    serde_json::to_string(filing).map_err(|e| FilingError::Store(e.to_string()))
}

fn from_json(json: &str) -> Result<FilingMetadata> {
    serde_json::from_str(json).map_err(|e| FilingError::Parse(e.to_string()))
}

#[async_trait]
impl MetadataStore for SqliteStore {
    #[instrument(skip(self, filing), fields(accession = %filing.accession_number))]
    async fn upsert_filing(&self, filing: &FilingMetadata) -> Result<bool> {
        let data_json = to_json(filing)?;
        let conn = self.lock()?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO filings
                 (accession_number, cik, report_date, data_json, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    filing.accession_number,
                    filing.cik.value(),
                    filing.report_date.map(|date| date.to_string()),
                    data_json,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| FilingError::Store(e.to_string()))?;

        Ok(inserted == 1)
    }

    #[instrument(skip(self))]
    async fn get_filing(&self, accession_number: &str) -> Result<Option<FilingMetadata>> {
        let conn = self.lock()?;

        let json = conn
            .query_row(
                "SELECT data_json FROM filings WHERE accession_number = ?1",
                params![accession_number],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| FilingError::Store(e.to_string()))?;

        json.as_deref().map(from_json).transpose()
    }

    #[instrument(skip(self), fields(cik = %cik))]
    async fn filings_for_cik(&self, cik: Cik) -> Result<Vec<FilingMetadata>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT data_json FROM filings
                 WHERE cik = ?1
                 ORDER BY report_date ASC, accession_number ASC",
            )
            .map_err(|e| FilingError::Store(e.to_string()))?;

        let rows = stmt
            .query_map(params![cik.value()], |row| row.get::<_, String>(0))
            .map_err(|e| FilingError::Store(e.to_string()))?;

        let mut filings = Vec::new();
        for row in rows {
            let json = row.map_err(|e| FilingError::Store(e.to_string()))?;
            filings.push(from_json(&json)?);
        }

        debug!("Found {} stored filings", filings.len());
        Ok(filings)
    }

    #[instrument(skip(self, file), fields(kind = %kind, file = %file.file_name))]
    async fn set_statement_file(
        &self,
        accession_number: &str,
        kind: StatementKind,
        file: &StatementFile,
    ) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| FilingError::Store(e.to_string()))?;

        let json = tx
            .query_row(
                "SELECT data_json FROM filings WHERE accession_number = ?1",
                params![accession_number],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| FilingError::Store(e.to_string()))?
            .ok_or_else(|| FilingError::NotFound(format!("filing {}", accession_number)))?;

        let mut filing = from_json(&json)?;
        filing.statement_files.insert(kind, file.clone());

        tx.execute(
            "UPDATE filings SET data_json = ?1 WHERE accession_number = ?2",
            params![to_json(&filing)?, accession_number],
        )
        .map_err(|e| FilingError::Store(e.to_string()))?;

        tx.commit().map_err(|e| FilingError::Store(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_document(&self, accession_number: &str, name: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;

        let data = conn
            .query_row(
                "SELECT data FROM documents WHERE accession_number = ?1 AND name = ?2",
                params![accession_number, name],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(|e| FilingError::Store(e.to_string()))?;

        match &data {
            Some(bytes) => debug!("Cache hit ({} bytes)", bytes.len()),
            None => debug!("Cache miss"),
        }
        Ok(data)
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn put_document(&self, accession_number: &str, name: &str, data: &[u8]) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO documents
             (accession_number, name, data, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![accession_number, name, data, Utc::now().to_rfc3339()],
        )
        .map_err(|e| FilingError::Store(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl)
                .map_err(|e| FilingError::Store(format!("Invalid TTL duration: {}", e)))?;

        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM documents WHERE cached_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .map_err(|e| FilingError::Store(e.to_string()))?;

        if deleted > 0 {
            debug!("Invalidated {} stale documents", deleted);
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM documents", [])
            .map_err(|e| FilingError::Store(e.to_string()))?;
        conn.execute("DELETE FROM filings", [])
            .map_err(|e| FilingError::Store(e.to_string()))?;

        debug!("Cleared all stored data");
        Ok(())
    }
}
