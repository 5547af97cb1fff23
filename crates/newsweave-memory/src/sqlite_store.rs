//! Structured store on embedded SQLite.
//!
//! Five tables: `users`, `feedback`, `learned_corrections`,
//! `knowledge_nodes`, `knowledge_edges`. The user profile is one JSON blob
//! for forward compatibility; columns other code filters on (`user_id`,
//! `processed`, `node_kind`) are real columns with secondary indices.
//! Writes serialize through a single connection.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use newsweave::error::{Error, Result};

use crate::models::{
    FeedbackKind, FeedbackSeverity, KnowledgeEdge, KnowledgeNode, LearnedCorrection, NodeKind,
    UserFeedback, UserProfile,
};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    profile_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS feedback (
    feedback_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    feedback_kind TEXT NOT NULL,
    severity TEXT NOT NULL,
    original_content TEXT NOT NULL,
    original_analysis TEXT NOT NULL,
    agent_kind TEXT NOT NULL,
    user_correction TEXT NOT NULL,
    user_explanation TEXT,
    topics_json TEXT,
    sources_json TEXT,
    processed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    learned_at TEXT,
    FOREIGN KEY (user_id) REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS learned_corrections (
    correction_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    pattern TEXT NOT NULL,
    correction TEXT NOT NULL,
    context TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0.5,
    times_applied INTEGER NOT NULL DEFAULT 0,
    times_confirmed INTEGER NOT NULL DEFAULT 0,
    times_rejected INTEGER NOT NULL DEFAULT 0,
    embedding_key TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS knowledge_nodes (
    node_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    node_kind TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    user_sentiment REAL NOT NULL DEFAULT 0.0,
    user_notes TEXT,
    interaction_count INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS knowledge_edges (
    edge_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    source_node_id TEXT NOT NULL,
    target_node_id TEXT NOT NULL,
    relation_kind TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 0.5,
    user_confirmed INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    FOREIGN KEY (user_id) REFERENCES users(user_id),
    FOREIGN KEY (source_node_id) REFERENCES knowledge_nodes(node_id),
    FOREIGN KEY (target_node_id) REFERENCES knowledge_nodes(node_id)
);

CREATE INDEX IF NOT EXISTS idx_feedback_user ON feedback(user_id);
CREATE INDEX IF NOT EXISTS idx_feedback_processed ON feedback(user_id, processed);
CREATE INDEX IF NOT EXISTS idx_corrections_user ON learned_corrections(user_id);
CREATE INDEX IF NOT EXISTS idx_nodes_user ON knowledge_nodes(user_id);
CREATE INDEX IF NOT EXISTS idx_edges_user ON knowledge_edges(user_id);
";

fn store_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::store(format!("{context}: {e}"))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| store_err("invalid stored timestamp", e))
}

/// The relational persistence layer.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| store_err("failed to create db directory", e))?;
            }
        }
        let conn =
            Connection::open(path).map_err(|e| store_err("failed to open database", e))?;
        Self::from_connection(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| store_err("failed to open in-memory database", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| store_err("failed to enable foreign keys", e))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| store_err("failed to initialize schema", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // === Users ===

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT profile_json FROM users WHERE user_id = ?1")
            .map_err(|e| store_err("prepare get_user", e))?;
        let mut rows = stmt
            .query(params![user_id])
            .map_err(|e| store_err("query get_user", e))?;

        match rows.next().map_err(|e| store_err("read get_user row", e))? {
            Some(row) => {
                let blob: String = row.get(0).map_err(|e| store_err("read profile blob", e))?;
                let profile = serde_json::from_str(&blob)
                    .map_err(|e| store_err("corrupt profile blob", e))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    pub async fn create_user(&self, profile: &UserProfile) -> Result<()> {
        let blob = serde_json::to_string(profile)
            .map_err(|e| store_err("serialize profile", e))?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (user_id, profile_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                profile.user_id,
                blob,
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339()
            ],
        )
        .map_err(|e| store_err("insert user", e))?;
        Ok(())
    }

    pub async fn update_user(&self, profile: &UserProfile) -> Result<()> {
        let blob = serde_json::to_string(profile)
            .map_err(|e| store_err("serialize profile", e))?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET profile_json = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![blob, profile.updated_at.to_rfc3339(), profile.user_id],
        )
        .map_err(|e| store_err("update user", e))?;
        Ok(())
    }

    /// Delete a user and everything hanging off them in one transaction.
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| store_err("begin delete transaction", e))?;
        for sql in [
            "DELETE FROM knowledge_edges WHERE user_id = ?1",
            "DELETE FROM knowledge_nodes WHERE user_id = ?1",
            "DELETE FROM learned_corrections WHERE user_id = ?1",
            "DELETE FROM feedback WHERE user_id = ?1",
            "DELETE FROM users WHERE user_id = ?1",
        ] {
            tx.execute(sql, params![user_id])
                .map_err(|e| store_err("delete user data", e))?;
        }
        tx.commit().map_err(|e| store_err("commit delete", e))?;
        Ok(())
    }

    // === Feedback ===

    pub async fn save_feedback(&self, feedback: &UserFeedback) -> Result<()> {
        let topics = serde_json::to_string(&feedback.topics)
            .map_err(|e| store_err("serialize topics", e))?;
        let sources = serde_json::to_string(&feedback.sources_mentioned)
            .map_err(|e| store_err("serialize sources", e))?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO feedback
             (feedback_id, user_id, session_id, feedback_kind, severity,
              original_content, original_analysis, agent_kind,
              user_correction, user_explanation, topics_json, sources_json,
              processed, created_at, learned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                feedback.feedback_id,
                feedback.user_id,
                feedback.session_id,
                feedback.feedback_kind.as_str(),
                feedback.severity.as_str(),
                feedback.original_content,
                feedback.original_analysis,
                feedback.agent_kind,
                feedback.user_correction,
                feedback.user_explanation,
                topics,
                sources,
                i64::from(feedback.processed),
                feedback.created_at.to_rfc3339(),
                feedback.learned_at.map(|dt| dt.to_rfc3339()),
            ],
        )
        .map_err(|e| store_err("insert feedback", e))?;
        Ok(())
    }

    pub async fn get_unprocessed_feedback(&self, user_id: &str) -> Result<Vec<UserFeedback>> {
        #[allow(clippy::type_complexity)]
        let raw: Vec<(
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            i64,
            String,
            Option<String>,
        )> = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT feedback_id, user_id, session_id, feedback_kind, severity,
                            original_content, original_analysis, agent_kind,
                            user_correction, user_explanation, topics_json, sources_json,
                            processed, created_at, learned_at
                     FROM feedback
                     WHERE user_id = ?1 AND processed = 0
                     ORDER BY created_at",
                )
                .map_err(|e| store_err("prepare unprocessed feedback", e))?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                        row.get(11)?,
                        row.get(12)?,
                        row.get(13)?,
                        row.get(14)?,
                    ))
                })
                .map_err(|e| store_err("query unprocessed feedback", e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| store_err("read feedback rows", e))?
        };

        raw.into_iter()
            .map(|row| {
                let (
                    feedback_id,
                    user_id,
                    session_id,
                    kind,
                    severity,
                    original_content,
                    original_analysis,
                    agent_kind,
                    user_correction,
                    user_explanation,
                    topics_json,
                    sources_json,
                    processed,
                    created_at,
                    learned_at,
                ) = row;
                Ok(UserFeedback {
                    feedback_id,
                    user_id,
                    session_id,
                    created_at: parse_ts(&created_at)?,
                    original_content,
                    original_analysis,
                    agent_kind,
                    feedback_kind: FeedbackKind::parse(&kind)
                        .ok_or_else(|| Error::store(format!("unknown feedback kind '{kind}'")))?,
                    severity: FeedbackSeverity::parse(&severity).unwrap_or_default(),
                    user_correction,
                    user_explanation,
                    topics: topics_json
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()
                        .map_err(|e| store_err("corrupt topics json", e))?
                        .unwrap_or_default(),
                    sources_mentioned: sources_json
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()
                        .map_err(|e| store_err("corrupt sources json", e))?
                        .unwrap_or_default(),
                    processed: processed != 0,
                    learned_at: learned_at.as_deref().map(parse_ts).transpose()?,
                })
            })
            .collect()
    }

    pub async fn mark_feedback_processed(&self, feedback_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE feedback SET processed = 1, learned_at = ?1 WHERE feedback_id = ?2",
            params![Utc::now().to_rfc3339(), feedback_id],
        )
        .map_err(|e| store_err("mark feedback processed", e))?;
        Ok(())
    }

    // === Corrections ===

    pub async fn save_correction(&self, correction: &LearnedCorrection) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO learned_corrections
             (correction_id, user_id, pattern, correction, context,
              confidence, times_applied, times_confirmed, times_rejected,
              embedding_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                correction.correction_id,
                correction.user_id,
                correction.pattern,
                correction.correction,
                correction.context,
                correction.confidence,
                correction.times_applied as i64,
                correction.times_confirmed as i64,
                correction.times_rejected as i64,
                correction.embedding_key,
                correction.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| store_err("insert correction", e))?;
        Ok(())
    }

    /// Corrections for a user, most trusted first.
    pub async fn get_corrections(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<LearnedCorrection>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT correction_id, user_id, pattern, correction, context,
                        confidence, times_applied, times_confirmed, times_rejected,
                        embedding_key, created_at
                 FROM learned_corrections
                 WHERE user_id = ?1
                 ORDER BY confidence DESC, created_at DESC
                 LIMIT ?2",
            )
            .map_err(|e| store_err("prepare get_corrections", e))?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_correction)
            .map_err(|e| store_err("query corrections", e))?;

        let raw = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| store_err("read correction rows", e))?;
        raw.into_iter().map(finish_correction).collect()
    }

    pub async fn get_correction(&self, correction_id: &str) -> Result<Option<LearnedCorrection>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT correction_id, user_id, pattern, correction, context,
                        confidence, times_applied, times_confirmed, times_rejected,
                        embedding_key, created_at
                 FROM learned_corrections WHERE correction_id = ?1",
            )
            .map_err(|e| store_err("prepare get_correction", e))?;
        let mut rows = stmt
            .query_map(params![correction_id], row_to_correction)
            .map_err(|e| store_err("query correction", e))?;

        match rows.next() {
            Some(row) => {
                let raw = row.map_err(|e| store_err("read correction row", e))?;
                Ok(Some(finish_correction(raw)?))
            }
            None => Ok(None),
        }
    }

    /// Closed-form stat update. Confirmed: `confidence += 0.05` (capped at
    /// 1); rejected: `confidence -= 0.10` (floored at 0). Both bump
    /// `times_applied`.
    pub async fn update_correction_stats(
        &self,
        correction_id: &str,
        confirmed: bool,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let sql = if confirmed {
            "UPDATE learned_corrections
             SET times_confirmed = times_confirmed + 1,
                 times_applied = times_applied + 1,
                 confidence = MIN(1.0, confidence + 0.05)
             WHERE correction_id = ?1"
        } else {
            "UPDATE learned_corrections
             SET times_rejected = times_rejected + 1,
                 times_applied = times_applied + 1,
                 confidence = MAX(0.0, confidence - 0.1)
             WHERE correction_id = ?1"
        };
        conn.execute(sql, params![correction_id])
            .map_err(|e| store_err("update correction stats", e))?;
        Ok(())
    }

    // === Knowledge graph ===

    pub async fn save_node(&self, node: &KnowledgeNode) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO knowledge_nodes
             (node_id, user_id, node_kind, name, description,
              user_sentiment, user_notes, interaction_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                node.node_id,
                node.user_id,
                node.node_kind.as_str(),
                node.name,
                node.description,
                node.user_sentiment,
                node.user_notes,
                node.interaction_count as i64,
            ],
        )
        .map_err(|e| store_err("insert node", e))?;
        Ok(())
    }

    pub async fn get_nodes(
        &self,
        user_id: &str,
        node_kind: Option<NodeKind>,
    ) -> Result<Vec<KnowledgeNode>> {
        let conn = self.conn.lock();
        let (sql, kind_filter) = match node_kind {
            Some(kind) => (
                "SELECT node_id, user_id, node_kind, name, description,
                        user_sentiment, user_notes, interaction_count
                 FROM knowledge_nodes WHERE user_id = ?1 AND node_kind = ?2",
                Some(kind.as_str().to_string()),
            ),
            None => (
                "SELECT node_id, user_id, node_kind, name, description,
                        user_sentiment, user_notes, interaction_count
                 FROM knowledge_nodes WHERE user_id = ?1",
                None,
            ),
        };

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| store_err("prepare get_nodes", e))?;
        let rows = match kind_filter {
            Some(kind) => stmt
                .query_map(params![user_id, kind], row_to_node)
                .map_err(|e| store_err("query nodes", e))?
                .collect::<rusqlite::Result<Vec<_>>>(),
            None => stmt
                .query_map(params![user_id], row_to_node)
                .map_err(|e| store_err("query nodes", e))?
                .collect::<rusqlite::Result<Vec<_>>>(),
        }
        .map_err(|e| store_err("read node rows", e))?;

        rows.into_iter().map(finish_node).collect()
    }

    pub async fn save_edge(&self, edge: &KnowledgeEdge) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO knowledge_edges
             (edge_id, user_id, source_node_id, target_node_id,
              relation_kind, weight, user_confirmed, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                edge.edge_id,
                edge.user_id,
                edge.source_node_id,
                edge.target_node_id,
                edge.relation_kind,
                edge.weight,
                i64::from(edge.user_confirmed),
                edge.notes,
            ],
        )
        .map_err(|e| store_err("insert edge", e))?;
        Ok(())
    }

    /// Nodes reachable one hop out from `node_id`, with the relation kind.
    pub async fn get_related_nodes(
        &self,
        node_id: &str,
    ) -> Result<Vec<(KnowledgeNode, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT n.node_id, n.user_id, n.node_kind, n.name, n.description,
                        n.user_sentiment, n.user_notes, n.interaction_count,
                        e.relation_kind
                 FROM knowledge_edges e
                 JOIN knowledge_nodes n ON e.target_node_id = n.node_id
                 WHERE e.source_node_id = ?1",
            )
            .map_err(|e| store_err("prepare related nodes", e))?;
        let rows = stmt
            .query_map(params![node_id], |row| {
                let node = row_to_node(row)?;
                let relation: String = row.get(8)?;
                Ok((node, relation))
            })
            .map_err(|e| store_err("query related nodes", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| store_err("read related node rows", e))?;

        rows.into_iter()
            .map(|(raw, relation)| Ok((finish_node(raw)?, relation)))
            .collect()
    }

    /// Number of feedback rows for a user (diagnostics).
    pub async fn feedback_count(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM feedback WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(|e| store_err("count feedback", e))?;
        Ok(count as usize)
    }
}

type RawCorrection = (
    String,
    String,
    String,
    String,
    String,
    f64,
    i64,
    i64,
    i64,
    Option<String>,
    String,
);

fn row_to_correction(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCorrection> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn finish_correction(raw: RawCorrection) -> Result<LearnedCorrection> {
    let (
        correction_id,
        user_id,
        pattern,
        correction,
        context,
        confidence,
        times_applied,
        times_confirmed,
        times_rejected,
        embedding_key,
        created_at,
    ) = raw;
    Ok(LearnedCorrection {
        correction_id,
        user_id,
        created_at: parse_ts(&created_at)?,
        pattern,
        correction,
        context,
        confidence,
        times_applied: times_applied.max(0) as u64,
        times_confirmed: times_confirmed.max(0) as u64,
        times_rejected: times_rejected.max(0) as u64,
        embedding_key,
    })
}

type RawNode = (
    String,
    String,
    String,
    String,
    Option<String>,
    f64,
    Option<String>,
    i64,
);

fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawNode> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn finish_node(raw: RawNode) -> Result<KnowledgeNode> {
    let (node_id, user_id, kind, name, description, user_sentiment, user_notes, interactions) =
        raw;
    Ok(KnowledgeNode {
        node_id,
        user_id,
        node_kind: NodeKind::parse(&kind)
            .ok_or_else(|| Error::store(format!("unknown node kind '{kind}'")))?,
        name,
        description,
        user_sentiment,
        user_notes,
        interaction_count: interactions.max(0) as u64,
    })
}
