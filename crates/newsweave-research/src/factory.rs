//! Provider and adapter wiring from [`Settings`].

use std::sync::Arc;

use tracing::warn;

use newsweave::config::{LlmProvider, Settings};
use newsweave::error::Result;
use newsweave::llm::{ChatModel, Embeddings};

use newsweave_anthropic::ChatAnthropic;
use newsweave_gnews::GoogleNewsScraper;
use newsweave_linkedin::LinkedInScraper;
use newsweave_newsapi::NewsApiScraper;
use newsweave_openai::{ChatOpenAi, OpenAiEmbeddings};
use newsweave_ptt::PttScraper;
use newsweave_threads::ThreadsScraper;

use crate::pipeline::PipelineContext;

/// Build the configured chat model.
pub fn create_chat_model(settings: &Settings) -> Result<Arc<dyn ChatModel>> {
    match settings.llm_provider {
        LlmProvider::OpenAi => Ok(Arc::new(
            ChatOpenAi::new(&settings.openai_api_key, &settings.llm_model)?
                .with_temperature(settings.llm_temperature)
                .with_max_tokens(settings.llm_max_tokens),
        )),
        LlmProvider::Anthropic => Ok(Arc::new(
            ChatAnthropic::new(&settings.anthropic_api_key, &settings.llm_model)?
                .with_temperature(settings.llm_temperature)
                .with_max_tokens(settings.llm_max_tokens),
        )),
    }
}

/// Build the embedding model. Embeddings always come from the primary
/// provider regardless of the chat provider.
pub fn create_embeddings(settings: &Settings) -> Result<Arc<dyn Embeddings>> {
    Ok(Arc::new(OpenAiEmbeddings::new(
        &settings.openai_api_key,
        &settings.embedding_model,
    )?))
}

/// Wire the default adapter set into a pipeline context. A missing NewsAPI
/// key degrades to RSS-only news gathering instead of failing.
pub fn default_pipeline_context(settings: &Settings) -> Result<PipelineContext> {
    let llm = create_chat_model(settings)?;
    let mut context = PipelineContext::new(llm)
        .with_news_scraper(Arc::new(GoogleNewsScraper::new()?))
        .with_forum_scraper(Arc::new(PttScraper::new()?), Vec::new())
        .with_social_scraper(Arc::new(ThreadsScraper::new()?))
        .with_professional_scraper(Arc::new(LinkedInScraper::new()?), Vec::new());

    match NewsApiScraper::new(settings.newsapi_key.clone()) {
        Ok(scraper) => context = context.with_news_scraper(Arc::new(scraper)),
        Err(e) => {
            warn!(error = %e, "NewsAPI disabled, using RSS only");
        }
    }

    Ok(context)
}
