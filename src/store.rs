use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;

/// Sink for ingested records. Accepting a batch is the only contract; there is
/// no read path.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Appends `documents` to `collection` as one batch and returns how many
    /// were written. Nothing is deduplicated.
    async fn insert_batch(
        &self,
        collection: &str,
        documents: Vec<Value>,
    ) -> Result<u64, StoreError>;
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

impl DocumentStore for PgDocumentStore {
    async fn insert_batch(
        &self,
        collection: &str,
        documents: Vec<Value>,
    ) -> Result<u64, StoreError> {
        if collection.trim().is_empty() {
            return Err(StoreError::EmptyCollection);
        }
        if documents.is_empty() {
            return Ok(0);
        }

        let batch_id = Uuid::new_v4();
        let ids: Vec<Uuid> = documents.iter().map(|_| Uuid::new_v4()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO customer_dashboard.documents (id, collection, batch_id, payload)
            SELECT doc.id, $1, $2, doc.payload
            FROM UNNEST($3::uuid[], $4::jsonb[]) AS doc(id, payload)
            "#,
        )
        .bind(collection)
        .bind(batch_id)
        .bind(&ids)
        .bind(&documents)
        .execute(&self.pool)
        .await?;

        info!(
            collection,
            %batch_id,
            rows = result.rows_affected(),
            "stored document batch"
        );

        Ok(result.rows_affected())
    }
}

/// Keeps batches in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<(String, Vec<Value>)> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.batches()
            .iter()
            .filter(|(name, _)| name == collection)
            .map(|(_, documents)| documents.len())
            .sum()
    }
}

impl DocumentStore for MemoryStore {
    async fn insert_batch(
        &self,
        collection: &str,
        documents: Vec<Value>,
    ) -> Result<u64, StoreError> {
        if collection.trim().is_empty() {
            return Err(StoreError::EmptyCollection);
        }
        let written = documents.len() as u64;
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((collection.to_string(), documents));
        Ok(written)
    }
}
