//! mgsmeval - score a chat model against multilingual grade-school math

use clap::Parser;
use mgsmeval::core::{
    ChatCompletionSampler, RetryPolicy, SamplerConfig, API_KEY_ENV, DEFAULT_BASE_URL,
};
use mgsmeval::error::Result;
use mgsmeval::evals::{self, get_eval, Eval, EvalOptions};
use mgsmeval::runner::EvalRunner;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sampler name matching the default model
const DEFAULT_SAMPLER_NAME: &str = "groq_llama3.1_8b_instant";
const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Score a chat model against multilingual grade-school math
#[derive(Parser, Debug)]
#[command(name = "mgsmeval")]
#[command(version = "0.1.0")]
#[command(about = "Run MGSM against an OpenAI-compatible chat API")]
struct Args {
    /// Comma-separated list of evals to run
    #[arg(long, default_value = "mgsm")]
    evals: String,

    /// Model identifier sent to the completion API
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Name used in output file stems; derived from the model when omitted
    #[arg(long)]
    sampler_name: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Base URL the MGSM datasets are fetched from
    #[arg(long, default_value = evals::mgsm::DEFAULT_DATA_BASE_URL)]
    data_url: String,

    /// Comma-separated MGSM language subset (default: all eleven)
    #[arg(long, default_value = "")]
    languages: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.5)]
    temperature: f64,

    /// Maximum output tokens per completion
    #[arg(long, default_value_t = 7999)]
    max_tokens: u32,

    /// Attempts per request before giving up
    #[arg(long, default_value_t = 8)]
    max_attempts: u32,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Debug mode: 10 examples per language and a _DEBUG file suffix
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Output directory for reports and results (default: system temp dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn split_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn sampler_name_for(model: &str) -> String {
    if model == DEFAULT_MODEL {
        DEFAULT_SAMPLER_NAME.to_string()
    } else {
        format!("groq_{}", model.replace('-', "_"))
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let options = EvalOptions {
        num_examples_per_lang: if args.debug { 10 } else { 250 },
        data_base_url: args.data_url.clone(),
        languages: split_names(&args.languages),
    };

    // Resolve every eval name up front: an unrecognized name is fatal
    // before any sampler is built or request sent.
    let mut eval_instances: Vec<(String, Box<dyn Eval>)> = Vec::new();
    for eval_name in split_names(&args.evals) {
        let eval = get_eval(&eval_name, &options)?;
        eval_instances.push((eval_name, eval));
    }

    let config = SamplerConfig {
        base_url: args.base_url.clone(),
        model: args.model.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        api_key: std::env::var(API_KEY_ENV).ok(),
        timeout_seconds: args.timeout,
        retry: RetryPolicy {
            max_attempts: args.max_attempts,
            ..RetryPolicy::default()
        },
    };

    let sampler_name = args
        .sampler_name
        .clone()
        .unwrap_or_else(|| sampler_name_for(&args.model));
    let samplers = vec![(sampler_name, ChatCompletionSampler::new(config)?)];

    let output_dir = args.output_dir.unwrap_or_else(std::env::temp_dir);
    let runner = EvalRunner::new(output_dir, args.debug);

    let summaries = runner.run(&samplers, &eval_instances).await?;

    let json = serde_json::to_string_pretty(&summaries)?;
    println!("{}", json);

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
