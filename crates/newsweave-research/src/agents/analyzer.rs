//! Deep analysis agent.

use std::sync::Arc;

use tracing::debug;

use newsweave::documents::Document;
use newsweave::error::Result;
use newsweave::llm::{chat_structured, ChatModel};

use crate::agents::user_input_block;
use crate::models::AnalysisResult;

/// Body text cap per source in the corpus summary.
const MAX_CONTENT_PER_SOURCE: usize = 500;

/// Condenses the gathered corpus and asks the LLM for structured insight.
/// `source_count` on the result is always overridden with the real corpus
/// size; the model's value is ignored.
pub struct Analyzer {
    llm: Arc<dyn ChatModel>,
}

impl Analyzer {
    #[must_use]
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    fn clip(text: &str) -> (&str, bool) {
        match text.char_indices().nth(MAX_CONTENT_PER_SOURCE) {
            Some((idx, _)) => (&text[..idx], true),
            None => (text, false),
        }
    }

    /// Format the corpus for the prompt: numbered entries with source and
    /// engagement annotations, bodies truncated.
    fn format_corpus(documents: &[Document]) -> String {
        if documents.is_empty() {
            return "(no source material)".to_string();
        }

        documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let (preview, clipped) = Self::clip(&doc.content);
                let ellipsis = if clipped { "..." } else { "" };
                let engagement = doc
                    .engagement
                    .as_ref()
                    .map(|e| format!(" (likes:{} comments:{})", e.likes, e.comments))
                    .unwrap_or_default();
                format!(
                    "{n}. [{kind}] {source}{engagement}\n   Title: {title}\n   Content: {preview}{ellipsis}",
                    n = i + 1,
                    kind = doc.source_kind,
                    source = doc.source_name,
                    title = doc.title,
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn build_prompt(topic: &str, documents: &[Document], depth: u8, language: &str) -> String {
        format!(
            "You are a professional news and social-media analyst who extracts key\n\
             insights from multiple sources.\n\
             \n\
             Analyze the material below and produce a structured report.\n\
             \n\
             {user_block}\n\
             \n\
             Analysis depth: {depth}/5\n\
             \n\
             Source material:\n\
             {corpus}\n\
             \n\
             Requirements:\n\
             - key_insights: 3-7 key insights (scale the count with depth)\n\
             - controversies: points of controversy, if any\n\
             - trending_angles: angles suited to short-form video\n\
             - sentiment_summary: the mood across viewpoints\n\
             - recommended_hooks: 3 opening hooks for the first 3 seconds\n\
             - source_count: how many sources were analyzed\n\
             - confidence_score: 0-1, based on source quantity and quality\n\
             \n\
             Respond in {language}.",
            user_block = user_input_block(&format!("Topic: {topic}")),
            corpus = Self::format_corpus(documents),
        )
    }

    pub async fn run(
        &self,
        topic: &str,
        documents: &[Document],
        depth: u8,
        language: &str,
    ) -> Result<AnalysisResult> {
        let prompt = Self::build_prompt(topic, documents, depth, language);
        let mut analysis: AnalysisResult = chat_structured(self.llm.as_ref(), &prompt).await?;

        // The corpus size is ground truth; never trust the model for it.
        analysis.source_count = documents.len();
        analysis.confidence_score = analysis.confidence_score.clamp(0.0, 1.0);

        debug!(
            topic,
            insights = analysis.key_insights.len(),
            confidence = analysis.confidence_score,
            "analysis finished"
        );
        Ok(analysis)
    }
}
