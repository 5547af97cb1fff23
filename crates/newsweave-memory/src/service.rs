//! The memory service facade.
//!
//! Validates user ids, whitelists updatable preference fields, and wires
//! the manager, feedback processor, and personalization engine behind one
//! API surface.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use newsweave::config::Settings;
use newsweave::error::{Error, Result};
use newsweave::llm::{ChatModel, Embeddings};

use crate::feedback::FeedbackProcessor;
use crate::manager::{MemoryManager, UserDataExport};
use crate::models::{
    AnalysisDepth, FeedbackKind, PreferredStyle, UserFeedback, UserProfile,
};
use crate::sqlite_store::SqliteStore;
use crate::vector_store::VectorStore;

/// Preference keys a caller may update; everything else is silently
/// ignored.
const UPDATABLE_FIELDS: &[&str] = &[
    "display_name",
    "language",
    "preferred_style",
    "analysis_depth",
    "blocked_sources",
];

fn user_id_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    #[allow(clippy::unwrap_used)] // static pattern is always valid
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,50}$").unwrap())
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id_pattern().is_match(user_id) {
        Ok(())
    } else {
        Err(Error::InvalidUserId(format!(
            "'{user_id}' (allowed: letters, digits, underscore, hyphen; 1-50 chars)"
        )))
    }
}

/// High-level memory API used by the presentation layer and the agents.
pub struct MemoryService {
    manager: Arc<MemoryManager>,
    feedback_processor: FeedbackProcessor,
    personalization: crate::personalization::PersonalizationEngine,
}

impl MemoryService {
    #[must_use]
    pub fn new(manager: Arc<MemoryManager>, llm: Arc<dyn ChatModel>) -> Self {
        Self {
            feedback_processor: FeedbackProcessor::new(Arc::clone(&manager), llm),
            personalization: crate::personalization::PersonalizationEngine::new(Arc::clone(
                &manager,
            )),
            manager,
        }
    }

    /// Open both stores at the configured paths and assemble the service.
    pub fn open(
        settings: &Settings,
        llm: Arc<dyn ChatModel>,
        embeddings: Arc<dyn Embeddings>,
    ) -> Result<Self> {
        let sqlite = Arc::new(SqliteStore::open(&settings.memory_db_path)?);
        let vector = Arc::new(VectorStore::open(&settings.vectorstore_dir, embeddings)?);
        Ok(Self::new(Arc::new(MemoryManager::new(sqlite, vector)), llm))
    }

    /// Shared manager handle for components composing on top of the
    /// service.
    #[must_use]
    pub fn manager(&self) -> Arc<MemoryManager> {
        Arc::clone(&self.manager)
    }

    // === Users ===

    pub async fn get_or_create_user(&self, user_id: &str) -> Result<UserProfile> {
        validate_user_id(user_id)?;
        self.manager.get_or_create_user(user_id).await
    }

    /// Apply whitelisted preference fields from a JSON object. Unknown
    /// keys and mistyped values are ignored without error.
    pub async fn update_preferences(
        &self,
        user_id: &str,
        preferences: &Value,
    ) -> Result<UserProfile> {
        validate_user_id(user_id)?;
        let mut profile = self.manager.get_or_create_user(user_id).await?;

        if let Some(map) = preferences.as_object() {
            for (key, value) in map {
                if !UPDATABLE_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                match key.as_str() {
                    "display_name" => {
                        if let Some(name) = value.as_str() {
                            profile.display_name = Some(name.to_string());
                        }
                    }
                    "language" => {
                        if let Some(language) = value.as_str() {
                            profile.language = language.to_string();
                        }
                    }
                    "preferred_style" => {
                        if let Some(style) = value.as_str().and_then(PreferredStyle::parse) {
                            profile.preferred_style = style;
                        }
                    }
                    "analysis_depth" => {
                        if let Some(depth) = value.as_str().and_then(AnalysisDepth::parse) {
                            profile.analysis_depth = depth;
                        }
                    }
                    "blocked_sources" => {
                        if let Some(sources) = value.as_array() {
                            profile.blocked_sources = sources
                                .iter()
                                .filter_map(|v| v.as_str().map(str::to_string))
                                .collect();
                        }
                    }
                    _ => {}
                }
            }
        }

        self.manager.update_user_profile(profile).await
    }

    // === Personalization ===

    pub async fn get_personalized_prompt(
        &self,
        user_id: &str,
        base_prompt: &str,
        current_input: &str,
        agent_kind: &str,
    ) -> Result<String> {
        validate_user_id(user_id)?;
        self.personalization
            .get_personalized_prompt(user_id, base_prompt, current_input, agent_kind)
            .await
    }

    // === Feedback ===

    /// Store one feedback item; returns the generated feedback id.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_feedback(
        &self,
        user_id: &str,
        session_id: &str,
        feedback_kind: FeedbackKind,
        original_content: &str,
        original_analysis: &str,
        user_correction: &str,
        agent_kind: &str,
        explanation: Option<String>,
    ) -> Result<String> {
        validate_user_id(user_id)?;
        // Feedback rows reference the user; make sure the profile exists.
        self.manager.get_or_create_user(user_id).await?;

        let mut feedback = UserFeedback::new(
            user_id,
            session_id,
            feedback_kind,
            original_content,
            original_analysis,
            user_correction,
        );
        feedback.agent_kind = agent_kind.to_string();
        feedback.user_explanation = explanation;

        self.manager.store_feedback(&feedback).await?;
        Ok(feedback.feedback_id)
    }

    /// Distill all pending feedback for a user; returns the number of
    /// items successfully processed.
    pub async fn process_feedback(&self, user_id: &str) -> Result<usize> {
        validate_user_id(user_id)?;
        self.feedback_processor.process_all_pending(user_id).await
    }

    // === GDPR ===

    pub async fn export_user_data(&self, user_id: &str) -> Result<UserDataExport> {
        validate_user_id(user_id)?;
        self.manager.export_user_data(user_id).await
    }

    pub async fn delete_user_data(&self, user_id: &str) -> Result<bool> {
        validate_user_id(user_id)?;
        self.manager.delete_user_data(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsweave::testing::{MockChatModel, MockEmbeddings};
    use serde_json::json;

    const EXTRACTION_JSON: &str = r#"{
        "pattern": "mislabels the company sector",
        "correction": "check the sector before labeling",
        "context": "stock news",
        "confidence": 0.75
    }"#;

    fn service_with_llm(llm: MockChatModel) -> MemoryService {
        let sqlite = Arc::new(SqliteStore::open_in_memory().unwrap());
        let vector = Arc::new(
            VectorStore::open_in_memory(Arc::new(MockEmbeddings::new(64))).unwrap(),
        );
        MemoryService::new(
            Arc::new(MemoryManager::new(sqlite, vector)),
            Arc::new(llm),
        )
    }

    fn service() -> MemoryService {
        service_with_llm(MockChatModel::new())
    }

    #[test]
    fn test_user_id_validation_rules() {
        assert!(validate_user_id("alice").is_ok());
        assert!(validate_user_id("user_01-x").is_ok());
        assert!(validate_user_id(&"a".repeat(50)).is_ok());

        assert!(matches!(
            validate_user_id("has space").unwrap_err(),
            Error::InvalidUserId(_)
        ));
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(&"a".repeat(51)).is_err());
        assert!(validate_user_id("tab\tchar").is_err());
        assert!(validate_user_id("dot.dot").is_err());
    }

    #[tokio::test]
    async fn test_invalid_user_id_rejected_at_every_entry_point() {
        let service = service();
        assert!(service.get_or_create_user("has space").await.is_err());
        assert!(service
            .update_preferences("has space", &json!({}))
            .await
            .is_err());
        assert!(service.process_feedback("has space").await.is_err());
        assert!(service.export_user_data("has space").await.is_err());
        assert!(service.delete_user_data("has space").await.is_err());
    }

    #[tokio::test]
    async fn test_update_preferences_whitelist_roundtrip() {
        let service = service();
        let updated = service
            .update_preferences(
                "alice",
                &json!({
                    "display_name": "Alice",
                    "language": "en-US",
                    "preferred_style": "technical",
                    "analysis_depth": "detailed",
                    "blocked_sources": ["tabloid.example"],
                    "user_id": "mallory",
                    "feedback_weight": 0.0
                }),
            )
            .await
            .unwrap();

        assert_eq!(updated.display_name.as_deref(), Some("Alice"));
        assert_eq!(updated.language, "en-US");
        assert_eq!(updated.preferred_style, PreferredStyle::Technical);
        assert_eq!(updated.analysis_depth, AnalysisDepth::Detailed);
        assert_eq!(updated.blocked_sources, vec!["tabloid.example"]);
        // Non-whitelisted keys were silently ignored.
        assert_eq!(updated.user_id, "alice");
        assert!((updated.feedback_weight - 0.7).abs() < f64::EPSILON);

        // And the write persisted.
        let loaded = service.get_or_create_user("alice").await.unwrap();
        assert_eq!(loaded.language, "en-US");
        assert_eq!(loaded.preferred_style, PreferredStyle::Technical);
    }

    #[tokio::test]
    async fn test_update_preferences_ignores_mistyped_values() {
        let service = service();
        let updated = service
            .update_preferences(
                "alice",
                &json!({
                    "preferred_style": "shouty",
                    "blocked_sources": "not-an-array"
                }),
            )
            .await
            .unwrap();
        assert_eq!(updated.preferred_style, PreferredStyle::Casual);
        assert!(updated.blocked_sources.is_empty());
    }

    #[tokio::test]
    async fn test_submit_then_process_feedback_once() {
        let service = service_with_llm(MockChatModel::new().with_reply(EXTRACTION_JSON));

        let feedback_id = service
            .submit_feedback(
                "alice",
                "session-1",
                FeedbackKind::Correction,
                "original content",
                "original analysis",
                "the sector label was wrong",
                "analyzer",
                Some("it called a chipmaker a bank".to_string()),
            )
            .await
            .unwrap();
        assert!(!feedback_id.is_empty());

        assert_eq!(service.process_feedback("alice").await.unwrap(), 1);
        // Processed exactly once: a second pass finds nothing pending.
        assert_eq!(service.process_feedback("alice").await.unwrap(), 0);

        // The distilled correction is retrievable by similarity.
        let relevant = service
            .manager()
            .get_relevant_corrections("alice", "mislabels the company sector", 5)
            .await
            .unwrap();
        assert!(!relevant.is_empty());
        let confidence = relevant[0]["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }

    #[tokio::test]
    async fn test_delete_then_recreate_yields_fresh_profile() {
        let service = service_with_llm(MockChatModel::new().with_reply(EXTRACTION_JSON));
        service
            .update_preferences("alice", &json!({"display_name": "Alice"}))
            .await
            .unwrap();
        service
            .submit_feedback(
                "alice",
                "s",
                FeedbackKind::Quality,
                "a",
                "b",
                "c",
                "analyzer",
                None,
            )
            .await
            .unwrap();
        service.process_feedback("alice").await.unwrap();

        let before_delete = chrono::Utc::now();
        assert!(service.delete_user_data("alice").await.unwrap());

        let fresh = service.get_or_create_user("alice").await.unwrap();
        assert!(fresh.display_name.is_none());
        assert!(fresh.created_at >= before_delete - chrono::Duration::seconds(1));

        let export = service.export_user_data("alice").await.unwrap();
        assert!(export.corrections.is_empty());
        assert!(export.knowledge_nodes.is_empty());
        assert!(service
            .manager()
            .get_relevant_corrections("alice", "sector", 5)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_export_contains_profile_and_corrections() {
        let service = service_with_llm(MockChatModel::new().with_reply(EXTRACTION_JSON));
        service
            .submit_feedback(
                "alice",
                "s",
                FeedbackKind::Correction,
                "a",
                "b",
                "c",
                "analyzer",
                None,
            )
            .await
            .unwrap();
        service.process_feedback("alice").await.unwrap();

        let export = service.export_user_data("alice").await.unwrap();
        assert!(export.profile.is_some());
        assert_eq!(export.corrections.len(), 1);
    }

    #[tokio::test]
    async fn test_open_builds_stores_at_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            memory_db_path: dir
                .path()
                .join("memory.db")
                .to_string_lossy()
                .into_owned(),
            vectorstore_dir: dir.path().join("vectors").to_string_lossy().into_owned(),
            ..Settings::default()
        };

        let service = MemoryService::open(
            &settings,
            Arc::new(MockChatModel::new()),
            Arc::new(MockEmbeddings::new(64)),
        )
        .unwrap();

        service.get_or_create_user("alice").await.unwrap();
        assert!(dir.path().join("memory.db").exists());
        assert!(dir.path().join("vectors").join("vectors.db").exists());
    }
}
