//! Provider-agnostic LLM traits and typed structured output.
//!
//! [`ChatModel`] and [`Embeddings`] are the two seams every provider crate
//! implements. [`chat_structured`] layers typed structured output on top of
//! any chat model: the target type's JSON schema is appended to the prompt,
//! the reply is JSON-extracted (markdown fences tolerated), and
//! deserialization failures surface as [`Error::LlmSchema`].

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// A chat-completion backend. One prompt in, one text reply out; transport
/// failures surface as [`Error::LlmTransport`].
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Identifier used in logs.
    fn model_name(&self) -> &str;
}

/// An embedding backend.
#[async_trait]
pub trait Embeddings: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Pull a JSON object out of a model reply. Handles fenced code blocks and
/// surrounding prose; the fallback takes the outermost `{...}` span.
pub fn extract_json(text: &str) -> Result<String> {
    let trimmed = text.trim();

    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                let candidate = after[..end].trim();
                if candidate.starts_with('{') {
                    return Ok(candidate.to_string());
                }
            }
        }
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(trimmed[start..=end].to_string()),
        _ => Err(Error::llm_schema(format!(
            "no JSON object found in model reply: {}",
            truncate(trimmed, 200)
        ))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Ask `model` for a reply conforming to `T`'s JSON schema and parse it.
pub async fn chat_structured<T>(model: &dyn ChatModel, prompt: &str) -> Result<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = schemars::schema_for!(T);
    let schema_json =
        serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string());

    let full_prompt = format!(
        "{prompt}\n\n\
         Respond with ONLY a JSON object, no additional text or explanation.\n\
         The JSON must conform to this schema:\n\
         ```json\n{schema_json}\n```"
    );

    let reply = model.generate(&full_prompt).await?;
    let json = extract_json(&reply)?;

    serde_json::from_str(&json).map_err(|e| {
        Error::llm_schema(format!(
            "failed to deserialize model reply into target type: {e}. JSON: {}",
            truncate(&json, 200)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChatModel;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Answer {
        answer: String,
        confidence: f64,
    }

    #[test]
    fn test_extract_json_plain_object() {
        let json = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(json, r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_json_fenced_block() {
        let reply = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json(reply).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_json_bare_fence() {
        let reply = "```\n{\"a\": 2}\n```";
        assert_eq!(extract_json(reply).unwrap(), r#"{"a": 2}"#);
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let reply = "The result is {\"a\": 3} as requested.";
        assert_eq!(extract_json(reply).unwrap(), r#"{"a": 3}"#);
    }

    #[test]
    fn test_extract_json_missing_object_errors() {
        let err = extract_json("no json here").unwrap_err();
        assert!(matches!(err, Error::LlmSchema(_)));
    }

    #[tokio::test]
    async fn test_chat_structured_parses_reply() {
        let model =
            MockChatModel::new().with_reply(r#"{"answer": "42", "confidence": 0.9}"#);
        let result: Answer = chat_structured(&model, "What is the answer?").await.unwrap();
        assert_eq!(result.answer, "42");
        assert!((result.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_chat_structured_prompt_contains_schema() {
        let model =
            MockChatModel::new().with_reply(r#"{"answer": "x", "confidence": 0.1}"#);
        let _: Answer = chat_structured(&model, "base prompt").await.unwrap();
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("base prompt"));
        assert!(prompts[0].contains("confidence"));
        assert!(prompts[0].contains("ONLY a JSON object"));
    }

    #[tokio::test]
    async fn test_chat_structured_schema_mismatch_is_schema_error() {
        let model = MockChatModel::new().with_reply(r#"{"unexpected": true}"#);
        let err = chat_structured::<Answer>(&model, "p").await.unwrap_err();
        assert!(matches!(err, Error::LlmSchema(_)));
    }

    #[tokio::test]
    async fn test_chat_structured_transport_error_passes_through() {
        let model = MockChatModel::new().with_error("connection reset");
        let err = chat_structured::<Answer>(&model, "p").await.unwrap_err();
        assert!(matches!(err, Error::LlmTransport(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let truncated = truncate("héllo wörld", 4);
        assert_eq!(truncated, "héll...");
    }
}
