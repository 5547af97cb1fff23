//! Embedding-indexed similarity search.
//!
//! Collections are isolated per user via `{user_id}_{kind}` naming (kinds:
//! `corrections`, `conversations`); names are sanitized to 63 characters
//! with dots replaced. Vectors are stored as little-endian f32 blobs in an
//! embedded SQLite file under the vectorstore directory, and search is
//! brute-force cosine over the collection, which stays small per user.
//!
//! Every database touch runs on the blocking thread pool so embedding and
//! scan work never stalls the async scheduler.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use newsweave::error::{Error, Result};
use newsweave::llm::Embeddings;

use crate::models::LearnedCorrection;

/// Collection name length cap (mirrors common vector-db limits).
const MAX_COLLECTION_NAME: usize = 63;

/// A conversation search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationHit {
    pub content: String,
    pub metadata: serde_json::Value,
    pub distance: f32,
}

fn store_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::store(format!("{context}: {e}"))
}

fn sanitize_collection(name: &str) -> String {
    let replaced = name.replace('.', "_");
    match replaced.char_indices().nth(MAX_COLLECTION_NAME) {
        Some((idx, _)) => replaced[..idx].to_string(),
        None => replaced,
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance in [0, 2]; degenerate vectors land at 1.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

fn content_hash(content: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in content.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{hash:016x}")[..10].to_string()
}

/// The embedding-indexed store.
pub struct VectorStore {
    conn: Arc<Mutex<Connection>>,
    embeddings: Arc<dyn Embeddings>,
}

impl VectorStore {
    /// Open (and create if needed) the store under `dir`.
    pub fn open(dir: impl AsRef<Path>, embeddings: Arc<dyn Embeddings>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| store_err("failed to create vectorstore directory", e))?;
        let conn = Connection::open(dir.join("vectors.db"))
            .map_err(|e| store_err("failed to open vector database", e))?;
        Self::from_connection(conn, embeddings)
    }

    /// In-memory store for tests.
    pub fn open_in_memory(embeddings: Arc<dyn Embeddings>) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| store_err("failed to open in-memory vector database", e))?;
        Self::from_connection(conn, embeddings)
    }

    fn from_connection(conn: Connection, embeddings: Arc<dyn Embeddings>) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embeddings (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                vector BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_embeddings_collection ON embeddings(collection);",
        )
        .map_err(|e| store_err("failed to initialize vector schema", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embeddings,
        })
    }

    fn collection_name(user_id: &str, kind: &str) -> String {
        sanitize_collection(&format!("{user_id}_{kind}"))
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            job(&conn)
        })
        .await
        .map_err(|e| store_err("vector store task failed", e))?
    }

    async fn collection_count(&self, collection: String) -> Result<usize> {
        self.run_blocking(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM embeddings WHERE collection = ?1",
                    params![collection],
                    |row| row.get(0),
                )
                .map_err(|e| store_err("count collection", e))?;
            Ok(count as usize)
        })
        .await
    }

    async fn upsert(
        &self,
        collection: String,
        id: String,
        text: String,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let vector = self.embeddings.embed_query(&text).await?;
        let blob = encode_vector(&vector);
        let metadata_json = metadata.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO embeddings (collection, id, text, metadata, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![collection, id, text, metadata_json, blob],
            )
            .map_err(|e| store_err("upsert embedding", e))?;
            Ok(())
        })
        .await
    }

    /// Top-k rows of a collection by cosine distance to `query`.
    async fn search(
        &self,
        collection: String,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(String, serde_json::Value, f32)>> {
        // Empty collections return empty without embedding the query.
        if self.collection_count(collection.clone()).await? == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embeddings.embed_query(query).await?;
        self.run_blocking(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT text, metadata, vector FROM embeddings WHERE collection = ?1",
                )
                .map_err(|e| store_err("prepare vector scan", e))?;
            let rows = stmt
                .query_map(params![collection], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                })
                .map_err(|e| store_err("scan collection", e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| store_err("read vector rows", e))?;

            let mut scored: Vec<(String, serde_json::Value, f32)> = rows
                .into_iter()
                .map(|(text, metadata_json, blob)| {
                    let metadata = serde_json::from_str(&metadata_json)
                        .unwrap_or(serde_json::Value::Null);
                    let distance = cosine_distance(&query_vector, &decode_vector(&blob));
                    (text, metadata, distance)
                })
                .collect();
            scored.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(limit);
            Ok(scored)
        })
        .await
    }

    // === Corrections ===

    /// Index a correction. The embedding key is the correction id.
    pub async fn store_correction(
        &self,
        user_id: &str,
        correction: &LearnedCorrection,
    ) -> Result<String> {
        let collection = Self::collection_name(user_id, "corrections");
        let text = format!(
            "{} | {} | {}",
            correction.pattern, correction.correction, correction.context
        );
        let metadata = json!({
            "correction_id": correction.correction_id,
            "pattern": correction.pattern,
            "correction": correction.correction,
            "context": correction.context,
            "confidence": correction.confidence,
        });
        self.upsert(collection, correction.correction_id.clone(), text, metadata)
            .await?;
        Ok(correction.correction_id.clone())
    }

    /// Corrections relevant to `query`, as metadata objects.
    pub async fn search_corrections(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>> {
        let collection = Self::collection_name(user_id, "corrections");
        let hits = self.search(collection, query, limit).await?;
        Ok(hits.into_iter().map(|(_, metadata, _)| metadata).collect())
    }

    // === Conversations ===

    pub async fn store_conversation(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
    ) -> Result<()> {
        let collection = Self::collection_name(user_id, "conversations");
        let id = format!("{session_id}_{}", content_hash(content));
        self.upsert(
            collection,
            id,
            content.to_string(),
            json!({"session_id": session_id}),
        )
        .await
    }

    pub async fn search_conversations(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ConversationHit>> {
        let collection = Self::collection_name(user_id, "conversations");
        let hits = self.search(collection, query, limit).await?;
        Ok(hits
            .into_iter()
            .map(|(content, metadata, distance)| ConversationHit {
                content,
                metadata,
                distance,
            })
            .collect())
    }

    /// Drop both of a user's collections. Idempotent: missing collections
    /// are not an error.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<()> {
        let corrections = Self::collection_name(user_id, "corrections");
        let conversations = Self::collection_name(user_id, "conversations");
        let deleted = self
            .run_blocking(move |conn| {
                let deleted = conn
                    .execute(
                        "DELETE FROM embeddings WHERE collection IN (?1, ?2)",
                        params![corrections, conversations],
                    )
                    .map_err(|e| store_err("delete user collections", e))?;
                Ok(deleted)
            })
            .await?;
        debug!(user_id, deleted, "vector collections cleared");
        Ok(())
    }

    /// Row count for one of a user's collections (diagnostics and tests).
    pub async fn count(&self, user_id: &str, kind: &str) -> Result<usize> {
        self.collection_count(Self::collection_name(user_id, kind))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsweave::testing::MockEmbeddings;

    fn store() -> VectorStore {
        VectorStore::open_in_memory(Arc::new(MockEmbeddings::new(64))).unwrap()
    }

    fn correction(user: &str, pattern: &str) -> LearnedCorrection {
        LearnedCorrection::new(user, pattern, "use the fixed form", "stock topics", 0.8)
    }

    #[test]
    fn test_sanitize_collection_truncates_and_replaces() {
        let sanitized = sanitize_collection("user.name_corrections");
        assert_eq!(sanitized, "user_name_corrections");

        let long = "u".repeat(100);
        let sanitized = sanitize_collection(&format!("{long}_corrections"));
        assert_eq!(sanitized.len(), 63);
    }

    #[test]
    fn test_vector_blob_roundtrip() {
        let vector = vec![0.25f32, -1.5, 3.0];
        assert_eq!(decode_vector(&encode_vector(&vector)), vector);
    }

    #[test]
    fn test_cosine_distance_bounds() {
        let a = vec![1.0f32, 0.0];
        let b = vec![0.0f32, 1.0];
        assert!((cosine_distance(&a, &a)).abs() < 1e-6);
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &[]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[0.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_store_and_search_correction() {
        let store = store();
        let correction = correction("alice", "confuses revenue with profit");
        store.store_correction("alice", &correction).await.unwrap();

        let hits = store
            .search_corrections("alice", "confuses revenue with profit", 5)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0]["pattern"], "confuses revenue with profit");
        assert_eq!(hits[0]["confidence"], 0.8);
    }

    #[tokio::test]
    async fn test_empty_collection_short_circuits() {
        let store = store();
        let hits = store.search_corrections("nobody", "anything", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_per_user_isolation() {
        let store = store();
        store
            .store_correction("alice", &correction("alice", "alice pattern"))
            .await
            .unwrap();

        let bob_hits = store
            .search_corrections("bob", "alice pattern", 5)
            .await
            .unwrap();
        assert!(bob_hits.is_empty());
    }

    #[tokio::test]
    async fn test_most_similar_first() {
        let store = store();
        store
            .store_correction("alice", &correction("alice", "mixing up quarterly numbers"))
            .await
            .unwrap();
        store
            .store_correction("alice", &correction("alice", "wrong company name spelling"))
            .await
            .unwrap();

        let hits = store
            .search_corrections("alice", "mixing up quarterly numbers", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["pattern"], "mixing up quarterly numbers");
    }

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let store = store();
        store
            .store_conversation("alice", "session-1", "we talked about AI regulation")
            .await
            .unwrap();

        let hits = store
            .search_conversations("alice", "AI regulation", 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("AI regulation"));
        assert_eq!(hits[0].metadata["session_id"], "session-1");
        assert!(hits[0].distance < 1.0);
    }

    #[tokio::test]
    async fn test_conversation_upsert_dedupes_same_content() {
        let store = store();
        for _ in 0..2 {
            store
                .store_conversation("alice", "session-1", "identical content")
                .await
                .unwrap();
        }
        assert_eq!(store.count("alice", "conversations").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_user_data_is_idempotent() {
        let store = store();
        store
            .store_correction("alice", &correction("alice", "p"))
            .await
            .unwrap();
        store
            .store_conversation("alice", "s", "c")
            .await
            .unwrap();

        store.delete_user_data("alice").await.unwrap();
        assert_eq!(store.count("alice", "corrections").await.unwrap(), 0);
        assert_eq!(store.count("alice", "conversations").await.unwrap(), 0);

        // Deleting again (missing collections) is not an error.
        store.delete_user_data("alice").await.unwrap();
    }

    #[tokio::test]
    async fn test_open_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let embeddings = Arc::new(MockEmbeddings::new(64));

        {
            let store =
                VectorStore::open(dir.path(), Arc::clone(&embeddings) as _).unwrap();
            store
                .store_correction("alice", &correction("alice", "persisted pattern"))
                .await
                .unwrap();
        }

        let store = VectorStore::open(dir.path(), embeddings).unwrap();
        let hits = store
            .search_corrections("alice", "persisted pattern", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
