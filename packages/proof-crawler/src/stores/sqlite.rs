//! SQLite storage implementation.
//!
//! A file-based backend for the three logical stores. Good for a single
//! crawler node that must keep its records and proofs across restarts.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{StorageError, StorageResult};
use crate::traits::store::{ItemCidStore, ProofStore, RecordStore};
use crate::types::{
    cid::{Cid, ItemCid, ProofCid},
    record::{ItemFields, Record},
};

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(Box::new(e))
}

/// SQLite-based crawl store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a SQLite store at the given connection URL and run migrations.
    ///
    /// # Example URLs
    /// - `sqlite://./crawler.db?mode=rwc` - Create if not exists
    /// - `sqlite::memory:` - In-memory database (see [`SqliteStore::in_memory`])
    pub async fn new(database_url: &str) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(backend)?;

        Self::with_pool(pool).await
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Uses a single connection: every SQLite in-memory connection is its
    /// own database.
    pub async fn in_memory() -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(backend)?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> StorageResult<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                url TEXT PRIMARY KEY,
                round INTEGER NOT NULL,
                fields TEXT,
                crawled_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS item_cids (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                round INTEGER NOT NULL,
                id TEXT NOT NULL,
                cid TEXT NOT NULL,
                UNIQUE(round, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS proofs (
                round INTEGER PRIMARY KEY,
                id TEXT NOT NULL,
                cid TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct RecordRow {
    url: String,
    round: i64,
    fields: Option<String>,
    crawled_at: String,
}

impl RecordRow {
    fn into_record(self) -> StorageResult<Record> {
        let crawled_at = chrono::DateTime::parse_from_rfc3339(&self.crawled_at)
            .map_err(|e| StorageError::Backend(format!("Invalid date: {}", e).into()))?
            .with_timezone(&chrono::Utc);

        let fields = self
            .fields
            .map(|json| serde_json::from_str::<ItemFields>(&json))
            .transpose()?;

        Ok(Record {
            url: self.url,
            round: self.round as u64,
            fields,
            crawled_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ItemCidRow {
    round: i64,
    id: String,
    cid: String,
}

impl From<ItemCidRow> for ItemCid {
    fn from(row: ItemCidRow) -> Self {
        ItemCid::new(row.id, row.round as u64, Cid::new(row.cid))
    }
}

#[derive(Debug, FromRow)]
struct ProofRow {
    round: i64,
    id: String,
    cid: String,
}

impl From<ProofRow> for ProofCid {
    fn from(row: ProofRow) -> Self {
        ProofCid {
            id: row.id,
            round: row.round as u64,
            cid: Cid::new(row.cid),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn put_record(&self, record: &Record) -> StorageResult<()> {
        let fields = record
            .fields
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO records (url, round, fields, crawled_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                round = excluded.round,
                fields = excluded.fields,
                crawled_at = excluded.crawled_at
            "#,
        )
        .bind(&record.url)
        .bind(record.round as i64)
        .bind(&fields)
        .bind(record.crawled_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn get_record(&self, url: &str) -> StorageResult<Option<Record>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT url, round, fields, crawled_at FROM records WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(RecordRow::into_record).transpose()
    }

    async fn count_records(&self) -> StorageResult<usize> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        Ok(count.0 as usize)
    }
}

#[async_trait]
impl ItemCidStore for SqliteStore {
    async fn put_item_cid(&self, item: &ItemCid) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_cids (round, id, cid)
            VALUES (?, ?, ?)
            ON CONFLICT(round, id) DO UPDATE SET cid = excluded.cid
            "#,
        )
        .bind(item.round as i64)
        .bind(&item.id)
        .bind(item.cid.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn item_cids_for_round(&self, round: u64) -> StorageResult<Vec<ItemCid>> {
        let rows = sqlx::query_as::<_, ItemCidRow>(
            "SELECT round, id, cid FROM item_cids WHERE round = ? ORDER BY seq",
        )
        .bind(round as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(ItemCid::from).collect())
    }
}

#[async_trait]
impl ProofStore for SqliteStore {
    async fn get_proof(&self, round: u64) -> StorageResult<Option<ProofCid>> {
        let row = sqlx::query_as::<_, ProofRow>("SELECT round, id, cid FROM proofs WHERE round = ?")
            .bind(round as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(ProofCid::from))
    }

    async fn put_proof(&self, proof: &ProofCid) -> StorageResult<bool> {
        let result = sqlx::query(
            "INSERT INTO proofs (round, id, cid) VALUES (?, ?, ?) ON CONFLICT(round) DO NOTHING",
        )
        .bind(proof.round as i64)
        .bind(&proof.id)
        .bind(proof.cid.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_record_roundtrip_and_overwrite() {
        let store = test_store().await;
        let url = "https://example.com/a/status/1";

        store
            .put_record(&Record::new(url, 1, ItemFields::new("@a", "first")))
            .await
            .unwrap();
        store
            .put_record(&Record::new(url, 2, ItemFields::new("@a", "second")))
            .await
            .unwrap();

        let stored = store.get_record(url).await.unwrap().unwrap();
        assert_eq!(stored.round, 2);
        assert_eq!(stored.fields.unwrap().text, "second");
        assert_eq!(store.count_records().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_item_cids_ordered_by_insertion() {
        let store = test_store().await;
        store.put_item_cid(&ItemCid::new("z", 4, Cid::from("cz"))).await.unwrap();
        store.put_item_cid(&ItemCid::new("a", 4, Cid::from("ca"))).await.unwrap();
        store.put_item_cid(&ItemCid::new("z", 4, Cid::from("cz2"))).await.unwrap();
        store.put_item_cid(&ItemCid::new("q", 5, Cid::from("cq"))).await.unwrap();

        let items = store.item_cids_for_round(4).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "z");
        assert_eq!(items[0].cid, Cid::from("cz2"));
        assert_eq!(items[1].id, "a");
    }

    #[tokio::test]
    async fn test_proof_insert_ignores_second_write() {
        let store = test_store().await;
        assert!(store.put_proof(&ProofCid::new(9, Cid::from("p1"))).await.unwrap());
        assert!(!store.put_proof(&ProofCid::new(9, Cid::from("p2"))).await.unwrap());

        let proof = store.get_proof(9).await.unwrap().unwrap();
        assert_eq!(proof.id, "proof:9");
        assert_eq!(proof.cid, Cid::from("p1"));
    }
}
