//! # newsweave-openai
//!
//! OpenAI backend for the [`newsweave::llm`] traits: chat completions with
//! JSON mode for structured output, and the embeddings endpoint for the
//! vector store.
//!
//! Credentials and model selection are injected at construction; nothing is
//! read from the environment here.

mod chat;
mod embeddings;

pub use chat::ChatOpenAi;
pub use embeddings::OpenAiEmbeddings;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
