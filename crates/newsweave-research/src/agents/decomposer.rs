//! Query decomposition.

use std::sync::Arc;

use tracing::debug;

use newsweave::error::{Error, Result};
use newsweave::llm::{chat_structured, ChatModel};

use crate::agents::user_input_block;
use crate::models::{ResearchRequest, SubQueryPlan};

/// Splits a topic into short, searchable sub-queries. The query count
/// scales with depth: between `max(2, depth)` and `min(5, depth + 1)`.
pub struct QueryDecomposer {
    llm: Arc<dyn ChatModel>,
}

impl QueryDecomposer {
    #[must_use]
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    fn query_bounds(depth: u8) -> (usize, usize) {
        let depth = usize::from(depth);
        let min_queries = depth.max(2);
        let max_queries = (depth + 1).min(5).max(min_queries);
        (min_queries, max_queries)
    }

    fn build_prompt(request: &ResearchRequest) -> String {
        let (min_queries, max_queries) = Self::query_bounds(request.depth);
        let sources: Vec<&str> = request.sources.iter().map(|s| s.as_str()).collect();

        format!(
            "You are a research lead. Break the topic below into searchable\n\
             sub-queries.\n\
             \n\
             {user_block}\n\
             \n\
             Research depth: {depth}/5\n\
             Available sources: {sources}\n\
             \n\
             Produce {min_queries} to {max_queries} sub-queries covering distinct angles:\n\
             1. Core facts (suited to news search)\n\
             2. Public reaction (suited to social/forum search)\n\
             3. Trend analysis (if depth >= 3)\n\
             4. Controversial viewpoints (if depth >= 4)\n\
             5. Deeper background (if depth >= 5)\n\
             \n\
             Query format rules (important):\n\
             - Each sub-query must be short: 2-5 words, at most 15 characters of\n\
               CJK text\n\
             - Use search-engine-friendly keyword combinations, no keyword stuffing\n\
             - Good: \"AI job loss\", \"GPT-5 launch\", \"Taiwan AI regulation\"\n\
             - Bad: \"2025 latest major artificial intelligence AI news model\n\
               updates mergers investment regulation\"\n\
             \n\
             Also provide a short search strategy description and the sources you\n\
             recommend. Respond in {language}.",
            user_block = user_input_block(&format!("Topic: {}", request.topic)),
            depth = request.depth,
            sources = sources.join(", "),
            language = request.language,
        )
    }

    /// Decompose the request's topic into a sub-query plan.
    pub async fn run(&self, request: &ResearchRequest) -> Result<SubQueryPlan> {
        let prompt = Self::build_prompt(request);
        let mut plan: SubQueryPlan = chat_structured(self.llm.as_ref(), &prompt)
            .await
            .map_err(|e| match e {
                Error::LlmSchema(msg) => Error::LlmSchema(format!("query decomposition: {msg}")),
                Error::LlmTransport(msg) => {
                    Error::LlmTransport(format!("query decomposition: {msg}"))
                }
                other => other,
            })?;

        plan.sub_queries = plan
            .sub_queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        let (_, max_queries) = Self::query_bounds(request.depth);
        if plan.sub_queries.len() > max_queries {
            plan.sub_queries.truncate(max_queries);
        }
        if plan.sub_queries.is_empty() {
            return Err(Error::llm_schema(
                "query decomposition produced no sub-queries",
            ));
        }

        debug!(
            topic = %request.topic,
            count = plan.sub_queries.len(),
            "topic decomposed"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsweave::testing::MockChatModel;

    fn plan_json(queries: &[&str]) -> String {
        serde_json::json!({
            "sub_queries": queries,
            "strategy": "news first",
            "recommended_sources": ["news"]
        })
        .to_string()
    }

    #[test]
    fn test_query_bounds_follow_depth() {
        assert_eq!(QueryDecomposer::query_bounds(1), (2, 2));
        assert_eq!(QueryDecomposer::query_bounds(2), (2, 3));
        assert_eq!(QueryDecomposer::query_bounds(3), (3, 4));
        assert_eq!(QueryDecomposer::query_bounds(4), (4, 5));
        assert_eq!(QueryDecomposer::query_bounds(5), (5, 5));
    }

    #[tokio::test]
    async fn test_run_returns_plan() {
        let llm = Arc::new(MockChatModel::new().with_reply(plan_json(&[
            "AI job loss",
            "AI hiring 2025",
        ])));
        let decomposer = QueryDecomposer::new(llm);
        let request = ResearchRequest::new("AI takes jobs").with_depth(2);

        let plan = decomposer.run(&request).await.unwrap();
        assert_eq!(plan.sub_queries, vec!["AI job loss", "AI hiring 2025"]);
        assert_eq!(plan.strategy, "news first");
    }

    #[tokio::test]
    async fn test_prompt_wraps_topic_and_states_bounds() {
        let llm = Arc::new(MockChatModel::new().with_reply(plan_json(&["a", "b"])));
        let decomposer = QueryDecomposer::new(Arc::clone(&llm) as _);
        let request = ResearchRequest::new("AI takes jobs").with_depth(1);
        decomposer.run(&request).await.unwrap();

        let prompt = &llm.prompts()[0];
        let start = prompt.find("<user_input>").unwrap();
        let end = prompt.find("</user_input>").unwrap();
        assert!(prompt[start..end].contains("AI takes jobs"));
        // depth=1 asks for exactly 2 queries.
        assert!(prompt.contains("Produce 2 to 2 sub-queries"));
    }

    #[tokio::test]
    async fn test_overlong_plan_is_truncated_to_max() {
        let llm = Arc::new(MockChatModel::new().with_reply(plan_json(&[
            "one", "two", "three", "four", "five", "six", "seven",
        ])));
        let decomposer = QueryDecomposer::new(llm);
        let request = ResearchRequest::new("topic").with_depth(5);

        let plan = decomposer.run(&request).await.unwrap();
        // depth=5 allows at most 5.
        assert_eq!(plan.sub_queries.len(), 5);
    }

    #[tokio::test]
    async fn test_blank_queries_are_dropped() {
        let llm = Arc::new(MockChatModel::new().with_reply(plan_json(&[
            "  AI job loss  ",
            "   ",
        ])));
        let decomposer = QueryDecomposer::new(llm);
        let plan = decomposer
            .run(&ResearchRequest::new("topic"))
            .await
            .unwrap();
        assert_eq!(plan.sub_queries, vec!["AI job loss"]);
    }

    #[tokio::test]
    async fn test_empty_plan_is_schema_error() {
        let llm = Arc::new(MockChatModel::new().with_reply(plan_json(&[])));
        let decomposer = QueryDecomposer::new(llm);
        let err = decomposer
            .run(&ResearchRequest::new("topic"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LlmSchema(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_tagged() {
        let llm = Arc::new(MockChatModel::new().with_error("timeout"));
        let decomposer = QueryDecomposer::new(llm);
        let err = decomposer
            .run(&ResearchRequest::new("topic"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("query decomposition"));
    }
}
