//! Coordination across the structured store and the vector store.
//!
//! Write ordering for corrections is structured-first: the SQLite row is
//! authoritative, and a vector-store failure after it is logged but does
//! not fail the operation. The profile cache is write-through and evicted
//! on user deletion.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use newsweave::error::Result;

use crate::models::{
    KnowledgeEdge, KnowledgeNode, LearnedCorrection, NodeKind, TopicPreference, UserFeedback,
    UserProfile,
};
use crate::sqlite_store::SqliteStore;
use crate::vector_store::{ConversationHit, VectorStore};

/// Everything the engine knows about a user's relationship to one topic.
#[derive(Debug, Serialize)]
pub struct TopicContext {
    pub topic_preference: Option<TopicPreference>,
    pub related_knowledge: Vec<KnowledgeNode>,
    pub related_conversations: Vec<ConversationHit>,
    pub user_style: String,
    pub analysis_depth: String,
}

/// GDPR export payload.
#[derive(Debug, Serialize)]
pub struct UserDataExport {
    pub profile: Option<UserProfile>,
    pub corrections: Vec<LearnedCorrection>,
    pub knowledge_nodes: Vec<KnowledgeNode>,
}

/// The memory engine's coordinator.
pub struct MemoryManager {
    sqlite: Arc<SqliteStore>,
    vector: Arc<VectorStore>,
    profile_cache: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryManager {
    #[must_use]
    pub fn new(sqlite: Arc<SqliteStore>, vector: Arc<VectorStore>) -> Self {
        Self {
            sqlite,
            vector,
            profile_cache: RwLock::new(HashMap::new()),
        }
    }

    // === Users ===

    /// Cache hit, else load, else create a default profile and persist it.
    pub async fn get_or_create_user(&self, user_id: &str) -> Result<UserProfile> {
        if let Some(profile) = self.profile_cache.read().get(user_id) {
            return Ok(profile.clone());
        }

        let profile = match self.sqlite.get_user(user_id).await? {
            Some(profile) => profile,
            None => {
                let profile = UserProfile::new(user_id);
                self.sqlite.create_user(&profile).await?;
                profile
            }
        };

        self.profile_cache
            .write()
            .insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }

    /// Persist a profile with a refreshed `updated_at`; write-through cache.
    pub async fn update_user_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        let mut profile = profile;
        profile.updated_at = Utc::now();
        self.sqlite.update_user(&profile).await?;
        self.profile_cache
            .write()
            .insert(profile.user_id.clone(), profile.clone());
        Ok(profile)
    }

    // === Feedback ===

    pub async fn store_feedback(&self, feedback: &UserFeedback) -> Result<()> {
        self.sqlite.save_feedback(feedback).await
    }

    pub async fn get_unprocessed_feedback(&self, user_id: &str) -> Result<Vec<UserFeedback>> {
        self.sqlite.get_unprocessed_feedback(user_id).await
    }

    pub async fn mark_feedback_processed(&self, feedback_id: &str) -> Result<()> {
        self.sqlite.mark_feedback_processed(feedback_id).await
    }

    // === Corrections ===

    /// Write to both stores, structured store first. The vector write is
    /// best-effort: on failure the correction stays queryable from SQLite
    /// and the miss is logged.
    pub async fn store_correction(&self, correction: &LearnedCorrection) -> Result<()> {
        let mut record = correction.clone();
        record.embedding_key = Some(record.correction_id.clone());
        self.sqlite.save_correction(&record).await?;

        if let Err(e) = self
            .vector
            .store_correction(&record.user_id, &record)
            .await
        {
            warn!(
                correction_id = %record.correction_id,
                error = %e,
                "vector index write failed; correction kept in structured store"
            );
        }
        Ok(())
    }

    /// Similarity search over the user's corrections.
    pub async fn get_relevant_corrections(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>> {
        self.vector.search_corrections(user_id, query, limit).await
    }

    /// Structured listing, highest confidence first.
    pub async fn get_corrections(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<LearnedCorrection>> {
        self.sqlite.get_corrections(user_id, limit).await
    }

    pub async fn update_correction_stats(
        &self,
        correction_id: &str,
        confirmed: bool,
    ) -> Result<()> {
        self.sqlite
            .update_correction_stats(correction_id, confirmed)
            .await
    }

    // === Topic context ===

    pub async fn get_topic_context(&self, user_id: &str, topic: &str) -> Result<TopicContext> {
        let profile = self.get_or_create_user(user_id).await?;

        let topic_preference = profile.topic_preferences.get(topic).cloned();
        let nodes = self.sqlite.get_nodes(user_id, Some(NodeKind::Topic)).await?;
        let topic_lower = topic.to_lowercase();
        let related_knowledge = nodes
            .into_iter()
            .filter(|node| node.name.to_lowercase().contains(&topic_lower))
            .collect();
        let related_conversations = self
            .vector
            .search_conversations(user_id, topic, 3)
            .await?;

        Ok(TopicContext {
            topic_preference,
            related_knowledge,
            related_conversations,
            user_style: profile.preferred_style.as_str().to_string(),
            analysis_depth: profile.analysis_depth.as_str().to_string(),
        })
    }

    pub async fn update_topic_preference(
        &self,
        user_id: &str,
        topic: &str,
        interest_level: f64,
        notes: &str,
    ) -> Result<UserProfile> {
        let mut profile = self.get_or_create_user(user_id).await?;
        profile.topic_preferences.insert(
            topic.to_string(),
            TopicPreference::new(topic, interest_level, notes),
        );
        self.update_user_profile(profile).await
    }

    // === Knowledge graph ===

    pub async fn save_knowledge_node(&self, node: &KnowledgeNode) -> Result<()> {
        self.sqlite.save_node(node).await
    }

    pub async fn save_knowledge_edge(&self, edge: &KnowledgeEdge) -> Result<()> {
        self.sqlite.save_edge(edge).await
    }

    pub async fn get_related_nodes(
        &self,
        node_id: &str,
    ) -> Result<Vec<(KnowledgeNode, String)>> {
        self.sqlite.get_related_nodes(node_id).await
    }

    // === Conversations ===

    pub async fn store_conversation(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
    ) -> Result<()> {
        self.vector
            .store_conversation(user_id, session_id, content)
            .await
    }

    // === GDPR ===

    pub async fn export_user_data(&self, user_id: &str) -> Result<UserDataExport> {
        Ok(UserDataExport {
            profile: self.sqlite.get_user(user_id).await?,
            corrections: self.sqlite.get_corrections(user_id, 1000).await?,
            knowledge_nodes: self.sqlite.get_nodes(user_id, None).await?,
        })
    }

    /// Delete everything; cascades through both stores and evicts cache.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<bool> {
        self.sqlite.delete_user(user_id).await?;
        self.vector.delete_user_data(user_id).await?;
        self.profile_cache.write().remove(user_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsweave::testing::MockEmbeddings;

    fn manager() -> MemoryManager {
        let sqlite = Arc::new(SqliteStore::open_in_memory().unwrap());
        let vector = Arc::new(
            VectorStore::open_in_memory(Arc::new(MockEmbeddings::new(64))).unwrap(),
        );
        MemoryManager::new(sqlite, vector)
    }

    #[tokio::test]
    async fn test_get_or_create_creates_default() {
        let manager = manager();
        let profile = manager.get_or_create_user("alice").await.unwrap();
        assert_eq!(profile.user_id, "alice");

        // Second call hits the cache and returns the same profile.
        let again = manager.get_or_create_user("alice").await.unwrap();
        assert_eq!(again.created_at, profile.created_at);
    }

    #[tokio::test]
    async fn test_update_profile_refreshes_updated_at_and_cache() {
        let manager = manager();
        let mut profile = manager.get_or_create_user("alice").await.unwrap();
        let before = profile.updated_at;
        profile.display_name = Some("Alice".to_string());

        let updated = manager.update_user_profile(profile).await.unwrap();
        assert!(updated.updated_at >= before);

        let cached = manager.get_or_create_user("alice").await.unwrap();
        assert_eq!(cached.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_store_correction_lands_in_both_stores() {
        let manager = manager();
        manager.get_or_create_user("alice").await.unwrap();
        let correction =
            LearnedCorrection::new("alice", "confuses net and gross", "say net", "finance", 0.6);
        manager.store_correction(&correction).await.unwrap();

        let listed = manager.get_corrections("alice", 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].embedding_key.as_deref(),
            Some(correction.correction_id.as_str())
        );

        let relevant = manager
            .get_relevant_corrections("alice", "confuses net and gross", 5)
            .await
            .unwrap();
        assert!(!relevant.is_empty());
        assert_eq!(relevant[0]["correction_id"], correction.correction_id.as_str());
    }

    #[tokio::test]
    async fn test_topic_context_composition() {
        let manager = manager();
        manager
            .update_topic_preference("alice", "AI", 0.9, "deeply interested")
            .await
            .unwrap();
        let node = KnowledgeNode::new("alice", NodeKind::Topic, "AI regulation");
        manager.save_knowledge_node(&node).await.unwrap();
        manager
            .store_conversation("alice", "s1", "we discussed AI safety")
            .await
            .unwrap();

        let context = manager.get_topic_context("alice", "AI").await.unwrap();
        assert!(context.topic_preference.is_some());
        assert_eq!(context.related_knowledge.len(), 1);
        assert_eq!(context.related_conversations.len(), 1);
        assert_eq!(context.user_style, "casual");
        assert_eq!(context.analysis_depth, "standard");
    }

    #[tokio::test]
    async fn test_topic_context_unrelated_nodes_excluded() {
        let manager = manager();
        manager.get_or_create_user("alice").await.unwrap();
        let node = KnowledgeNode::new("alice", NodeKind::Topic, "Climate change");
        manager.save_knowledge_node(&node).await.unwrap();

        let context = manager.get_topic_context("alice", "AI").await.unwrap();
        assert!(context.related_knowledge.is_empty());
    }

    #[tokio::test]
    async fn test_delete_user_data_clears_everything() {
        let manager = manager();
        let profile = manager.get_or_create_user("alice").await.unwrap();
        let created_before_delete = profile.created_at;
        let correction = LearnedCorrection::new("alice", "p", "c", "ctx", 0.5);
        manager.store_correction(&correction).await.unwrap();

        assert!(manager.delete_user_data("alice").await.unwrap());

        assert!(manager.get_corrections("alice", 10).await.unwrap().is_empty());
        assert!(manager
            .get_relevant_corrections("alice", "p", 5)
            .await
            .unwrap()
            .is_empty());

        // A fresh default profile is created on next access.
        let fresh = manager.get_or_create_user("alice").await.unwrap();
        assert!(fresh.created_at >= created_before_delete);
        assert!(fresh.topic_preferences.is_empty());
    }

    #[tokio::test]
    async fn test_export_user_data() {
        let manager = manager();
        manager.get_or_create_user("alice").await.unwrap();
        let correction = LearnedCorrection::new("alice", "p", "c", "ctx", 0.5);
        manager.store_correction(&correction).await.unwrap();
        let node = KnowledgeNode::new("alice", NodeKind::Entity, "Acme");
        manager.save_knowledge_node(&node).await.unwrap();

        let export = manager.export_user_data("alice").await.unwrap();
        assert!(export.profile.is_some());
        assert_eq!(export.corrections.len(), 1);
        assert_eq!(export.knowledge_nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_knowledge_edges_via_manager() {
        let manager = manager();
        manager.get_or_create_user("alice").await.unwrap();
        let a = KnowledgeNode::new("alice", NodeKind::Topic, "AI");
        let b = KnowledgeNode::new("alice", NodeKind::Organization, "OpenAI");
        manager.save_knowledge_node(&a).await.unwrap();
        manager.save_knowledge_node(&b).await.unwrap();
        manager
            .save_knowledge_edge(&KnowledgeEdge::new("alice", &a.node_id, &b.node_id, "involves"))
            .await
            .unwrap();

        let related = manager.get_related_nodes(&a.node_id).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].0.name, "OpenAI");
    }
}
