//! Video brief synthesis agent.

use std::sync::Arc;

use tracing::debug;

use newsweave::documents::Document;
use newsweave::error::Result;
use newsweave::llm::{chat_structured, ChatModel};

use crate::agents::user_input_block;
use crate::models::{
    brief_timestamp, default_platform_variants, AnalysisResult, LlmPlatformTips, LlmVideoOutput,
    PlatformVariant, SourceRef, VideoBrief,
};

/// Turns an analysis into a complete video brief. The LLM produces the
/// creative fields; sources and platform metadata are composed
/// deterministically, and the final confidence blends analysis confidence
/// with corpus size: `clamp(analysis * 0.7 + 0.3 * min(1, n/10), 0, 1)`.
pub struct Synthesizer {
    llm: Arc<dyn ChatModel>,
}

impl Synthesizer {
    #[must_use]
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    fn join_or(items: &[String], fallback: &str) -> String {
        if items.is_empty() {
            fallback.to_string()
        } else {
            items.join("; ")
        }
    }

    fn build_prompt(topic: &str, analysis: &AnalysisResult, tone: &str, language: &str) -> String {
        format!(
            "You are a top short-form video planner who turns news analysis into\n\
             compelling video material.\n\
             \n\
             Produce complete video material from the analysis below.\n\
             \n\
             {user_block}\n\
             \n\
             Analysis summary:\n\
             - Key insights: {insights}\n\
             - Controversies: {controversies}\n\
             - Trending angles: {angles}\n\
             - Sentiment: {sentiment}\n\
             - Source count: {source_count}\n\
             \n\
             Requirements:\n\
             - title_suggestion: a click-worthy title with a number or question,\n\
               15-25 characters\n\
             - hook_line: an opener that grabs attention inside 3 seconds\n\
             - key_talking_points: 3-5 points, 1-2 sentences each\n\
             - visual_suggestions: 4 visual ideas describing the shot\n\
             - viral_score: 0-1 viral potential\n\
             - target_emotion: the emotion to aim for (humor/shock/insight/anger/warmth)\n\
             - controversy_level: low/medium/high\n\
             - call_to_action: a CTA that invites comments or shares\n\
             - hashtag_suggestions: 5-8 relevant hashtags\n\
             - platform_tips: 3 concrete production tips each for TikTok,\n\
               YouTube Shorts, and Instagram Reels, specific to this topic\n\
             \n\
             Tone: {tone}\n\
             Respond in {language}.",
            user_block = user_input_block(&format!("Topic: {topic}")),
            insights = Self::join_or(&analysis.key_insights, "none"),
            controversies = Self::join_or(&analysis.controversies, "no obvious controversy"),
            angles = Self::join_or(&analysis.trending_angles, "no specific angle"),
            sentiment = analysis.sentiment_summary,
            source_count = analysis.source_count,
        )
    }

    /// Cited-source list derived from the collected documents.
    fn build_sources(documents: &[Document]) -> Vec<SourceRef> {
        documents
            .iter()
            .map(|doc| SourceRef {
                title: doc.title.clone(),
                url: doc.url.clone(),
                source_kind: doc.source_kind.as_str().to_string(),
                published_at: doc
                    .published_at
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string()),
            })
            .collect()
    }

    /// Static metadata merged with LLM tips, filtered by requested
    /// platforms. An empty or fully-unknown selection falls back to all
    /// defaults.
    fn build_platform_variants(
        target_platforms: &[String],
        tips: &LlmPlatformTips,
    ) -> Vec<PlatformVariant> {
        let targets: Vec<String> = target_platforms
            .iter()
            .map(|p| p.to_lowercase())
            .collect();

        let defaults = default_platform_variants();
        let variants: Vec<PlatformVariant> = defaults
            .iter()
            .filter_map(|default| {
                let key = default.platform.to_lowercase().replace(' ', "_");
                if !targets.is_empty() && !targets.contains(&key) {
                    return None;
                }
                let llm_tips = match key.as_str() {
                    "tiktok" => &tips.tiktok,
                    "youtube_shorts" => &tips.youtube_shorts,
                    "instagram_reels" => &tips.instagram_reels,
                    _ => return None,
                };
                Some(PlatformVariant {
                    tips: if llm_tips.is_empty() {
                        default.tips.clone()
                    } else {
                        llm_tips.clone()
                    },
                    ..default.clone()
                })
            })
            .collect();

        if variants.is_empty() {
            defaults
        } else {
            variants
        }
    }

    fn blend_confidence(analysis_confidence: f64, n_sources: usize) -> f64 {
        (analysis_confidence * 0.7 + 0.3 * (n_sources as f64 / 10.0).min(1.0)).clamp(0.0, 1.0)
    }

    pub async fn run(
        &self,
        topic: &str,
        analysis: &AnalysisResult,
        documents: &[Document],
        target_platforms: &[String],
        tone: &str,
        language: &str,
    ) -> Result<VideoBrief> {
        let prompt = Self::build_prompt(topic, analysis, tone, language);
        let output: LlmVideoOutput = chat_structured(self.llm.as_ref(), &prompt).await?;

        let brief = VideoBrief {
            topic: output.topic,
            title_suggestion: output.title_suggestion,
            hook_line: output.hook_line,
            key_talking_points: output.key_talking_points,
            visual_suggestions: output.visual_suggestions,
            viral_score: output.viral_score.clamp(0.0, 1.0),
            target_emotion: output.target_emotion,
            controversy_level: output.controversy_level,
            call_to_action: output.call_to_action,
            hashtag_suggestions: output.hashtag_suggestions,
            platform_variants: Self::build_platform_variants(
                target_platforms,
                &output.platform_tips,
            ),
            sources: Self::build_sources(documents),
            generated_at: brief_timestamp(),
            confidence_score: Self::blend_confidence(
                analysis.confidence_score,
                documents.len(),
            ),
        };

        debug!(
            topic = %brief.topic,
            viral_score = brief.viral_score,
            confidence = brief.confidence_score,
            "brief synthesized"
        );
        Ok(brief)
    }
}
