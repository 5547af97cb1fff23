//! Domain models for the research pipeline.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use newsweave::documents::SourceKind;
use newsweave::error::{Error, Result};

/// A request to research one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    pub user_id: String,
    pub language: String,
    /// Which source classes to gather from; subset of news/social/forum.
    pub sources: Vec<SourceKind>,
    /// Research depth, 1 (shallow) to 5 (exhaustive).
    pub depth: u8,
    pub max_results_per_source: usize,
    /// Free-text tone instruction for the synthesizer.
    pub tone: String,
}

impl ResearchRequest {
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            user_id: "anonymous".to_string(),
            language: "zh-TW".to_string(),
            sources: vec![SourceKind::News, SourceKind::Social, SourceKind::Forum],
            depth: 2,
            max_results_per_source: 10,
            tone: "neutral".to_string(),
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<SourceKind>) -> Self {
        self.sources = sources;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth.clamp(1, 5);
        self
    }

    #[must_use]
    pub fn with_max_results_per_source(mut self, max_results: usize) -> Self {
        self.max_results_per_source = max_results.clamp(1, 50);
        self
    }

    #[must_use]
    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    /// Reject requests that cannot produce anything meaningful.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(Error::invalid_input("topic must not be empty"));
        }
        if !(1..=5).contains(&self.depth) {
            return Err(Error::invalid_input("depth must be between 1 and 5"));
        }
        if !(1..=50).contains(&self.max_results_per_source) {
            return Err(Error::invalid_input(
                "max_results_per_source must be between 1 and 50",
            ));
        }
        Ok(())
    }
}

/// The decomposer's output: short keyword sub-queries plus advisory
/// strategy prose.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubQueryPlan {
    /// Short keyword search queries covering different angles.
    pub sub_queries: Vec<String>,
    /// Prose description of the search strategy.
    pub strategy: String,
    /// Which sources the model recommends for this topic.
    #[serde(default)]
    pub recommended_sources: Vec<String>,
}

/// Structured output of the analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    pub topic: String,
    /// 3-7 key insights, scaled by depth.
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub controversies: Vec<String>,
    #[serde(default)]
    pub trending_angles: Vec<String>,
    #[serde(default)]
    pub sentiment_summary: String,
    /// Up to 3 opening-hook suggestions.
    #[serde(default)]
    pub recommended_hooks: Vec<String>,
    /// Set authoritatively from the collected corpus, not by the LLM.
    #[serde(default)]
    pub source_count: usize,
    /// 0-1 confidence in the analysis.
    pub confidence_score: f64,
}

/// Per-platform tips produced by the LLM for the synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LlmPlatformTips {
    /// Production tips specific to TikTok.
    pub tiktok: Vec<String>,
    /// Production tips specific to YouTube Shorts.
    pub youtube_shorts: Vec<String>,
    /// Production tips specific to Instagram Reels.
    pub instagram_reels: Vec<String>,
}

/// The creative fields the LLM fills during synthesis; sources and
/// platform metadata are composed deterministically around it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LlmVideoOutput {
    pub topic: String,
    pub title_suggestion: String,
    pub hook_line: String,
    pub key_talking_points: Vec<String>,
    pub visual_suggestions: Vec<String>,
    pub viral_score: f64,
    pub target_emotion: String,
    #[serde(default = "default_controversy_level")]
    pub controversy_level: String,
    pub call_to_action: String,
    pub hashtag_suggestions: Vec<String>,
    pub platform_tips: LlmPlatformTips,
}

fn default_controversy_level() -> String {
    "medium".to_string()
}

/// A cited source inside the final brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
    pub source_kind: String,
    #[serde(default)]
    pub published_at: Option<String>,
}

/// Platform-specific packaging of the brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformVariant {
    pub platform: String,
    pub duration: String,
    pub format: String,
    pub aspect_ratio: String,
    pub tips: Vec<String>,
}

/// The final artifact: everything needed to produce a short-form video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoBrief {
    pub topic: String,
    pub title_suggestion: String,
    pub hook_line: String,
    pub key_talking_points: Vec<String>,
    pub visual_suggestions: Vec<String>,
    pub viral_score: f64,
    pub target_emotion: String,
    pub controversy_level: String,
    pub call_to_action: String,
    pub hashtag_suggestions: Vec<String>,
    pub platform_variants: Vec<PlatformVariant>,
    pub sources: Vec<SourceRef>,
    pub generated_at: String,
    pub confidence_score: f64,
}

/// Static per-platform metadata merged with LLM tips at synthesis time.
#[must_use]
pub fn default_platform_variants() -> Vec<PlatformVariant> {
    vec![
        PlatformVariant {
            platform: "TikTok".to_string(),
            duration: "15-60s".to_string(),
            format: "vertical".to_string(),
            aspect_ratio: "9:16".to_string(),
            tips: vec![
                "Put the most striking shot in the first 3 seconds".to_string(),
                "Use a trending sound".to_string(),
                "Lean on text overlays".to_string(),
            ],
        },
        PlatformVariant {
            platform: "YouTube Shorts".to_string(),
            duration: "<=60s".to_string(),
            format: "vertical".to_string(),
            aspect_ratio: "9:16".to_string(),
            tips: vec![
                "Put keywords in the title".to_string(),
                "Add a subscribe reminder".to_string(),
                "Link a long-form follow-up".to_string(),
            ],
        },
        PlatformVariant {
            platform: "Instagram Reels".to_string(),
            duration: "<=90s".to_string(),
            format: "vertical".to_string(),
            aspect_ratio: "9:16".to_string(),
            tips: vec![
                "Drive traffic through stories".to_string(),
                "Keep hashtags under 30".to_string(),
                "Add the brand tag".to_string(),
            ],
        },
    ]
}

/// Timestamp format used in briefs.
#[must_use]
pub fn brief_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M").to_string()
}
