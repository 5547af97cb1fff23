//! Command-line runner: one research request in, one brief (or error) out
//! as pretty-printed JSON.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use newsweave::config::Settings;
use newsweave::documents::SourceKind;
use newsweave_research::factory::default_pipeline_context;
use newsweave_research::pipeline::{run_research, PipelineStep};
use newsweave_research::ResearchRequest;

#[derive(Parser, Debug)]
#[command(name = "newsweave", about = "Research a topic into a short-form video brief")]
struct Args {
    /// Topic to research.
    topic: String,

    /// Research depth, 1-5.
    #[arg(short, long, default_value_t = 2)]
    depth: u8,

    /// Sources to gather from (news, social, forum). Repeatable.
    #[arg(short, long = "source", value_parser = parse_source)]
    sources: Vec<SourceKind>,

    /// Maximum results per source.
    #[arg(long, default_value_t = 10)]
    max_results: usize,

    /// User id for personalization-aware callers.
    #[arg(short, long, default_value = "anonymous")]
    user: String,

    /// Language tag for gathering and output.
    #[arg(short, long, default_value = "zh-TW")]
    language: String,

    /// Tone instruction for the synthesizer.
    #[arg(short, long, default_value = "neutral")]
    tone: String,
}

fn parse_source(raw: &str) -> Result<SourceKind, String> {
    match raw.to_ascii_lowercase().as_str() {
        "news" => Ok(SourceKind::News),
        "social" => Ok(SourceKind::Social),
        "forum" => Ok(SourceKind::Forum),
        other => Err(format!("unknown source '{other}' (news/social/forum)")),
    }
}

fn init_tracing(settings: &Settings) {
    let default_directive = if settings.debug {
        "debug"
    } else {
        // Config speaks "warning", tracing speaks "warn".
        match settings.log_level.as_str() {
            "warning" => "warn",
            level => level,
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("newsweave={default_directive}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let settings = Settings::from_env();
    init_tracing(&settings);

    let mut request = ResearchRequest::new(&args.topic)
        .with_user_id(&args.user)
        .with_language(&args.language)
        .with_depth(args.depth)
        .with_max_results_per_source(args.max_results)
        .with_tone(&args.tone);
    if !args.sources.is_empty() {
        request = request.with_sources(args.sources.clone());
    }

    let context = match default_pipeline_context(&settings) {
        Ok(context) => Arc::new(context),
        Err(e) => {
            error!(error = %e, "failed to assemble pipeline");
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let state = match run_research(request, context).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "pipeline execution failed");
            eprintln!("pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };

    for entry in &state.execution_log {
        eprintln!("  {entry}");
    }

    if state.current_step == Some(PipelineStep::Complete) {
        match serde_json::to_string_pretty(&state.video_brief) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("failed to render brief: {e}");
                return ExitCode::FAILURE;
            }
        }
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "research failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        );
        ExitCode::FAILURE
    }
}
