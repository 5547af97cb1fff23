//! Prompt personalization.
//!
//! Appends per-user sections to an agent's base prompt: preferences,
//! relevant past corrections (vector search against the current input),
//! the user's viewpoint on the topic, and blocked sources. Sections with
//! no backing data are omitted entirely.

use std::sync::Arc;

use newsweave::error::Result;

use crate::manager::MemoryManager;

/// Composes personalized prompts from memory.
pub struct PersonalizationEngine {
    manager: Arc<MemoryManager>,
}

impl PersonalizationEngine {
    #[must_use]
    pub fn new(manager: Arc<MemoryManager>) -> Self {
        Self { manager }
    }

    /// `base_prompt` plus personalization sections, joined by blank lines.
    pub async fn get_personalized_prompt(
        &self,
        user_id: &str,
        base_prompt: &str,
        current_input: &str,
        _agent_kind: &str,
    ) -> Result<String> {
        let profile = self.manager.get_or_create_user(user_id).await?;
        let corrections = self
            .manager
            .get_relevant_corrections(user_id, current_input, 5)
            .await?;
        let topic_context = self
            .manager
            .get_topic_context(user_id, current_input)
            .await?;

        let mut sections: Vec<String> = Vec::new();

        let mut preferences = format!(
            "## User preferences\n- Style: {}\n- Depth: {}\n- Language: {}",
            profile.preferred_style.as_str(),
            profile.analysis_depth.as_str(),
            profile.language
        );
        if let Some(background) = &profile.professional_background {
            preferences.push_str(&format!("\n- Professional background: {background}"));
        }
        if !profile.areas_of_expertise.is_empty() {
            preferences.push_str(&format!(
                "\n- Areas of expertise: {}",
                profile.areas_of_expertise.join(", ")
            ));
        }
        sections.push(preferences);

        if !corrections.is_empty() {
            let lines: Vec<String> = corrections
                .iter()
                .map(|c| {
                    format!(
                        "- Pattern: {}\n  Fix: {}\n  Applies to: {}",
                        c["pattern"].as_str().unwrap_or(""),
                        c["correction"].as_str().unwrap_or(""),
                        c["context"].as_str().unwrap_or("")
                    )
                })
                .collect();
            sections.push(format!(
                "## Past corrections (avoid repeating these mistakes)\n{}",
                lines.join("\n")
            ));
        }

        if let Some(preference) = &topic_context.topic_preference {
            sections.push(format!(
                "## User's viewpoint on this topic\n- Interest level: {}\n- Notes: {}",
                preference.interest_level,
                if preference.notes.is_empty() {
                    "none"
                } else {
                    &preference.notes
                }
            ));
        }

        if !profile.blocked_sources.is_empty() {
            sections.push(format!(
                "## Sources to avoid citing\n{}",
                profile.blocked_sources.join(", ")
            ));
        }

        Ok(format!("{base_prompt}\n\n{}", sections.join("\n\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LearnedCorrection;
    use crate::sqlite_store::SqliteStore;
    use crate::vector_store::VectorStore;
    use newsweave::testing::MockEmbeddings;

    fn engine() -> (PersonalizationEngine, Arc<MemoryManager>) {
        let sqlite = Arc::new(SqliteStore::open_in_memory().unwrap());
        let vector = Arc::new(
            VectorStore::open_in_memory(Arc::new(MockEmbeddings::new(64))).unwrap(),
        );
        let manager = Arc::new(MemoryManager::new(sqlite, vector));
        (PersonalizationEngine::new(Arc::clone(&manager)), manager)
    }

    #[tokio::test]
    async fn test_prompt_starts_with_base_and_has_preferences() {
        let (engine, _manager) = engine();
        let prompt = engine
            .get_personalized_prompt("alice", "Analyze this topic.", "AI", "analyzer")
            .await
            .unwrap();
        assert!(prompt.starts_with("Analyze this topic.\n\n"));
        assert!(prompt.contains("## User preferences"));
        assert!(prompt.contains("- Style: casual"));
        assert!(prompt.contains("- Language: zh-TW"));
    }

    #[tokio::test]
    async fn test_empty_sections_are_omitted() {
        let (engine, _manager) = engine();
        let prompt = engine
            .get_personalized_prompt("alice", "base", "AI", "analyzer")
            .await
            .unwrap();
        assert!(!prompt.contains("## Past corrections"));
        assert!(!prompt.contains("## Sources to avoid"));
        assert!(!prompt.contains("## User's viewpoint"));
    }

    #[tokio::test]
    async fn test_corrections_section_appears_when_relevant() {
        let (engine, manager) = engine();
        manager.get_or_create_user("alice").await.unwrap();
        let correction = LearnedCorrection::new(
            "alice",
            "mislabels chip companies",
            "verify the company sector first",
            "semiconductor news",
            0.8,
        );
        manager.store_correction(&correction).await.unwrap();

        let prompt = engine
            .get_personalized_prompt("alice", "base", "mislabels chip companies", "analyzer")
            .await
            .unwrap();
        assert!(prompt.contains("## Past corrections"));
        assert!(prompt.contains("verify the company sector first"));
    }

    #[tokio::test]
    async fn test_blocked_sources_and_topic_sections() {
        let (engine, manager) = engine();
        let mut profile = manager.get_or_create_user("alice").await.unwrap();
        profile.blocked_sources.push("tabloid.example".to_string());
        manager.update_user_profile(profile).await.unwrap();
        manager
            .update_topic_preference("alice", "AI", 0.9, "skeptical of hype")
            .await
            .unwrap();

        let prompt = engine
            .get_personalized_prompt("alice", "base", "AI", "synthesizer")
            .await
            .unwrap();
        assert!(prompt.contains("## Sources to avoid citing\ntabloid.example"));
        assert!(prompt.contains("## User's viewpoint on this topic"));
        assert!(prompt.contains("skeptical of hype"));
    }

    #[tokio::test]
    async fn test_background_and_expertise_in_preferences() {
        let (engine, manager) = engine();
        let mut profile = manager.get_or_create_user("alice").await.unwrap();
        profile.professional_background = Some("equity analyst".to_string());
        profile.areas_of_expertise = vec!["finance".to_string(), "tech".to_string()];
        manager.update_user_profile(profile).await.unwrap();

        let prompt = engine
            .get_personalized_prompt("alice", "base", "AI", "analyzer")
            .await
            .unwrap();
        assert!(prompt.contains("- Professional background: equity analyst"));
        assert!(prompt.contains("- Areas of expertise: finance, tech"));
    }
}
