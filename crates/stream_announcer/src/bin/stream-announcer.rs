use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use stream_announcer::{
    budget::{append_link, content_max},
    openai::OpenAIClient,
    tracing::init_tracing_subscriber,
    validation::Validator,
    AnnouncementPipelineBuilder, Direction, GenerationRequest, GuardrailConfig, Network,
};

#[derive(Parser)]
#[command(name = "stream-announcer", about = "Guarded go-live announcement generator")]
struct Cli {
    /// JSON guardrail config; built-in defaults when omitted
    #[arg(long, env = "GUARDRAIL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct StreamArgs {
    /// `start` or `end`
    #[arg(long, default_value = "start")]
    direction: Direction,

    /// Streaming platform, e.g. Twitch
    #[arg(long)]
    platform: String,

    #[arg(long)]
    username: String,

    #[arg(long)]
    title: String,

    /// Stream link appended after the generated text
    #[arg(long)]
    url: Option<String>,

    /// Target networks, repeatable
    #[arg(long = "network", default_value = "bluesky")]
    networks: Vec<Network>,
}

impl StreamArgs {
    fn requests(&self, is_thinking_model: bool) -> Vec<GenerationRequest> {
        self.networks
            .iter()
            .map(|network| {
                let request = GenerationRequest::new(
                    self.direction,
                    &self.platform,
                    &self.username,
                    &self.title,
                    network.clone(),
                )
                .thinking_model(is_thinking_model);
                match &self.url {
                    Some(url) => request.with_url(url),
                    None => request,
                }
            })
            .collect()
    }
}

#[derive(Subcommand)]
enum Command {
    /// Generate one announcement per network
    Announce {
        #[command(flatten)]
        stream: StreamArgs,

        /// OpenAI-compatible API key
        #[arg(long, env = "OPENAI_API_KEY")]
        api_key: Option<String>,

        /// Base URL of an OpenAI-compatible endpoint
        #[arg(long, env = "OPENAI_BASE_URL", default_value = OpenAIClient::DEFAULT_BASE_URL)]
        base_url: String,

        #[arg(long, env = "LLM_MODEL", default_value = OpenAIClient::DEFAULT_MODEL)]
        model: String,

        /// The model emits a reasoning trace before its answer
        #[arg(long, env = "LLM_THINKING_MODEL")]
        thinking: bool,
    },
    /// Run the guardrails against an existing text without calling a backend
    Check {
        #[command(flatten)]
        stream: StreamArgs,

        #[arg(long)]
        text: String,
    },
}

/// Posted whenever the pipeline yields nothing.
fn template_message(request: &GenerationRequest) -> String {
    let text = match request.direction {
        Direction::Start => format!(
            "{} is now live on {}! {}",
            request.username, request.platform_name, request.title
        ),
        Direction::End => format!(
            "Thanks for watching! {} has ended the stream on {}.",
            request.username, request.platform_name
        ),
    };
    match request.direction {
        Direction::Start => append_link(&text, request.url.as_deref()),
        Direction::End => text,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let config = match &cli.config {
        Some(path) => GuardrailConfig::from_path(path)
            .inspect_err(|e| tracing::error!(error = %e, path = %path.display(), "Failed to load config"))?,
        None => GuardrailConfig::default(),
    };

    match cli.command {
        Command::Announce {
            stream,
            api_key,
            base_url,
            model,
            thinking,
        } => {
            let client = OpenAIClient::new(api_key)
                .with_base_url(base_url)
                .with_model(model);

            let pipeline = AnnouncementPipelineBuilder::new(config)
                .generator(client)
                .with_dedup_cache()
                .build()?;

            let requests = stream.requests(thinking);
            let results = pipeline.announce_many(&requests).await;

            for (request, result) in requests.iter().zip(results) {
                let post = result.unwrap_or_else(|| {
                    tracing::warn!(network = %request.network, "Falling back to template message");
                    template_message(request)
                });
                println!("[{}]\n{post}\n", request.network);
            }
        }
        Command::Check { stream, text } => {
            let config = Arc::new(config);
            let validator = Validator::new(Arc::clone(&config))?;

            for request in stream.requests(false) {
                let max = content_max(
                    &config,
                    &request.network,
                    request.direction,
                    request.url.as_deref(),
                );
                let candidate = validator.validate(&text, &request, max);
                let verdict = if candidate.is_emittable(config.emit_on_advisory) {
                    "ok"
                } else {
                    "rejected"
                };

                println!("[{}] {verdict} (score {}/10, budget {max})", request.network, candidate.score);
                println!("{}", candidate.text);
                for issue in &candidate.issues {
                    println!("  - {issue}");
                }
                if !candidate.score_issues.is_empty() {
                    println!("  quality: {}", candidate.score_issues.iter().join("; "));
                }
                println!();
            }
        }
    }

    Ok(())
}
