//! Memory data model: profiles, feedback, corrections, knowledge graph.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content style a user prefers in generated material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredStyle {
    Formal,
    #[default]
    Casual,
    Technical,
    Simplified,
}

impl PreferredStyle {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferredStyle::Formal => "formal",
            PreferredStyle::Casual => "casual",
            PreferredStyle::Technical => "technical",
            PreferredStyle::Simplified => "simplified",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "formal" => Some(PreferredStyle::Formal),
            "casual" => Some(PreferredStyle::Casual),
            "technical" => Some(PreferredStyle::Technical),
            "simplified" => Some(PreferredStyle::Simplified),
            _ => None,
        }
    }
}

/// How deep analysis output should go for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Brief,
    #[default]
    Standard,
    Detailed,
    Comprehensive,
}

impl AnalysisDepth {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDepth::Brief => "brief",
            AnalysisDepth::Standard => "standard",
            AnalysisDepth::Detailed => "detailed",
            AnalysisDepth::Comprehensive => "comprehensive",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "brief" => Some(AnalysisDepth::Brief),
            "standard" => Some(AnalysisDepth::Standard),
            "detailed" => Some(AnalysisDepth::Detailed),
            "comprehensive" => Some(AnalysisDepth::Comprehensive),
            _ => None,
        }
    }
}

/// Per-topic interest record inside a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicPreference {
    pub topic: String,
    pub interest_level: f64,
    #[serde(default)]
    pub notes: String,
    pub updated_at: DateTime<Utc>,
}

impl TopicPreference {
    #[must_use]
    pub fn new(topic: impl Into<String>, interest_level: f64, notes: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            interest_level: interest_level.clamp(0.0, 1.0),
            notes: notes.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Trust record for one news source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTrust {
    pub source_name: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub trust_level: f64,
    #[serde(default)]
    pub notes: String,
}

/// The full per-user profile, stored as one serialized blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub display_name: Option<String>,
    pub language: String,
    pub timezone: String,

    pub preferred_style: PreferredStyle,
    pub analysis_depth: AnalysisDepth,

    #[serde(default)]
    pub topic_preferences: HashMap<String, TopicPreference>,
    #[serde(default)]
    pub trusted_sources: Vec<SourceTrust>,
    #[serde(default)]
    pub blocked_sources: Vec<String>,

    #[serde(default)]
    pub professional_background: Option<String>,
    #[serde(default)]
    pub areas_of_expertise: Vec<String>,

    pub auto_learn_from_feedback: bool,
    pub feedback_weight: f64,
}

impl UserProfile {
    /// A default profile for a freshly seen user.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            display_name: None,
            language: "zh-TW".to_string(),
            timezone: "Asia/Taipei".to_string(),
            preferred_style: PreferredStyle::default(),
            analysis_depth: AnalysisDepth::default(),
            topic_preferences: HashMap::new(),
            trusted_sources: Vec::new(),
            blocked_sources: Vec::new(),
            professional_background: None,
            areas_of_expertise: Vec::new(),
            auto_learn_from_feedback: true,
            feedback_weight: 0.7,
        }
    }
}

/// What kind of feedback a user submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Correction,
    Disagreement,
    Preference,
    Relevance,
    Quality,
}

impl FeedbackKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Correction => "correction",
            FeedbackKind::Disagreement => "disagreement",
            FeedbackKind::Preference => "preference",
            FeedbackKind::Relevance => "relevance",
            FeedbackKind::Quality => "quality",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "correction" => Some(FeedbackKind::Correction),
            "disagreement" => Some(FeedbackKind::Disagreement),
            "preference" => Some(FeedbackKind::Preference),
            "relevance" => Some(FeedbackKind::Relevance),
            "quality" => Some(FeedbackKind::Quality),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackSeverity {
    Minor,
    #[default]
    Moderate,
    Major,
    Critical,
}

impl FeedbackSeverity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackSeverity::Minor => "minor",
            FeedbackSeverity::Moderate => "moderate",
            FeedbackSeverity::Major => "major",
            FeedbackSeverity::Critical => "critical",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "minor" => Some(FeedbackSeverity::Minor),
            "moderate" => Some(FeedbackSeverity::Moderate),
            "major" => Some(FeedbackSeverity::Major),
            "critical" => Some(FeedbackSeverity::Critical),
            _ => None,
        }
    }
}

/// One raw feedback item as submitted by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFeedback {
    pub feedback_id: String,
    pub user_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,

    pub original_content: String,
    pub original_analysis: String,
    pub agent_kind: String,

    pub feedback_kind: FeedbackKind,
    pub severity: FeedbackSeverity,
    pub user_correction: String,
    #[serde(default)]
    pub user_explanation: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub sources_mentioned: Vec<String>,

    pub processed: bool,
    #[serde(default)]
    pub learned_at: Option<DateTime<Utc>>,
}

impl UserFeedback {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        feedback_kind: FeedbackKind,
        original_content: impl Into<String>,
        original_analysis: impl Into<String>,
        user_correction: impl Into<String>,
    ) -> Self {
        Self {
            feedback_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            original_content: original_content.into(),
            original_analysis: original_analysis.into(),
            agent_kind: "general".to_string(),
            feedback_kind,
            severity: FeedbackSeverity::default(),
            user_correction: user_correction.into(),
            user_explanation: None,
            topics: Vec::new(),
            sources_mentioned: Vec::new(),
            processed: false,
            learned_at: None,
        }
    }
}

/// A distilled, reusable correction learned from feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedCorrection {
    pub correction_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,

    /// The situation where the system tends to go wrong.
    pub pattern: String,
    /// How to fix it.
    pub correction: String,
    /// Where the fix applies.
    pub context: String,

    pub confidence: f64,
    pub times_applied: u64,
    pub times_confirmed: u64,
    pub times_rejected: u64,

    #[serde(default)]
    pub embedding_key: Option<String>,
}

impl LearnedCorrection {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        pattern: impl Into<String>,
        correction: impl Into<String>,
        context: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            correction_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            created_at: Utc::now(),
            pattern: pattern.into(),
            correction: correction.into(),
            context: context.into(),
            confidence: confidence.clamp(0.0, 1.0),
            times_applied: 0,
            times_confirmed: 0,
            times_rejected: 0,
            embedding_key: None,
        }
    }
}

/// Knowledge graph node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Topic,
    Entity,
    Source,
    Concept,
    Person,
    Organization,
}

impl NodeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Topic => "topic",
            NodeKind::Entity => "entity",
            NodeKind::Source => "source",
            NodeKind::Concept => "concept",
            NodeKind::Person => "person",
            NodeKind::Organization => "organization",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "topic" => Some(NodeKind::Topic),
            "entity" => Some(NodeKind::Entity),
            "source" => Some(NodeKind::Source),
            "concept" => Some(NodeKind::Concept),
            "person" => Some(NodeKind::Person),
            "organization" => Some(NodeKind::Organization),
            _ => None,
        }
    }
}

/// A node in a user's knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub node_id: String,
    pub user_id: String,
    pub node_kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,

    pub user_sentiment: f64,
    #[serde(default)]
    pub user_notes: Option<String>,
    pub interaction_count: u64,
}

impl KnowledgeNode {
    #[must_use]
    pub fn new(user_id: impl Into<String>, node_kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            node_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            node_kind,
            name: name.into(),
            description: None,
            user_sentiment: 0.0,
            user_notes: None,
            interaction_count: 0,
        }
    }
}

/// A relation between two knowledge nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub edge_id: String,
    pub user_id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub relation_kind: String,
    pub weight: f64,
    pub user_confirmed: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl KnowledgeEdge {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        source_node_id: impl Into<String>,
        target_node_id: impl Into<String>,
        relation_kind: impl Into<String>,
    ) -> Self {
        Self {
            edge_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            source_node_id: source_node_id.into(),
            target_node_id: target_node_id.into(),
            relation_kind: relation_kind.into(),
            weight: 0.5,
            user_confirmed: false,
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = UserProfile::new("alice");
        assert_eq!(profile.user_id, "alice");
        assert_eq!(profile.language, "zh-TW");
        assert_eq!(profile.preferred_style, PreferredStyle::Casual);
        assert_eq!(profile.analysis_depth, AnalysisDepth::Standard);
        assert!(profile.auto_learn_from_feedback);
        assert!((profile.feedback_weight - 0.7).abs() < f64::EPSILON);
        assert!(profile.topic_preferences.is_empty());
    }

    #[test]
    fn test_profile_blob_roundtrip() {
        let mut profile = UserProfile::new("bob");
        profile.topic_preferences.insert(
            "AI".to_string(),
            TopicPreference::new("AI", 0.9, "follows closely"),
        );
        profile.blocked_sources.push("tabloid.example".to_string());

        let blob = serde_json::to_string(&profile).unwrap();
        let back: UserProfile = serde_json::from_str(&blob).unwrap();
        assert_eq!(back.user_id, "bob");
        assert!((back.topic_preferences["AI"].interest_level - 0.9).abs() < f64::EPSILON);
        assert_eq!(back.blocked_sources, vec!["tabloid.example"]);
    }

    #[test]
    fn test_enum_string_mapping_roundtrip() {
        for style in [
            PreferredStyle::Formal,
            PreferredStyle::Casual,
            PreferredStyle::Technical,
            PreferredStyle::Simplified,
        ] {
            assert_eq!(PreferredStyle::parse(style.as_str()), Some(style));
        }
        for depth in [
            AnalysisDepth::Brief,
            AnalysisDepth::Standard,
            AnalysisDepth::Detailed,
            AnalysisDepth::Comprehensive,
        ] {
            assert_eq!(AnalysisDepth::parse(depth.as_str()), Some(depth));
        }
        for kind in [
            FeedbackKind::Correction,
            FeedbackKind::Disagreement,
            FeedbackKind::Preference,
            FeedbackKind::Relevance,
            FeedbackKind::Quality,
        ] {
            assert_eq!(FeedbackKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(PreferredStyle::parse("shouty"), None);
        assert_eq!(NodeKind::parse("topic"), Some(NodeKind::Topic));
    }

    #[test]
    fn test_feedback_new_defaults() {
        let feedback = UserFeedback::new(
            "alice",
            "session-1",
            FeedbackKind::Correction,
            "content",
            "analysis",
            "the fix",
        );
        assert!(!feedback.processed);
        assert!(feedback.learned_at.is_none());
        assert_eq!(feedback.severity, FeedbackSeverity::Moderate);
        assert_eq!(feedback.agent_kind, "general");
        assert!(Uuid::parse_str(&feedback.feedback_id).is_ok());
    }

    #[test]
    fn test_correction_confidence_clamped() {
        let correction = LearnedCorrection::new("u", "p", "c", "ctx", 1.7);
        assert!((correction.confidence - 1.0).abs() < f64::EPSILON);
        let correction = LearnedCorrection::new("u", "p", "c", "ctx", -0.5);
        assert!(correction.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_topic_preference_clamps_interest() {
        let pref = TopicPreference::new("x", 3.0, "");
        assert!((pref.interest_level - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_knowledge_edge_defaults() {
        let edge = KnowledgeEdge::new("u", "n1", "n2", "related_to");
        assert!((edge.weight - 0.5).abs() < f64::EPSILON);
        assert!(!edge.user_confirmed);
    }
}
