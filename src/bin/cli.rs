//! TripAgent CLI
//!
//! Command-line interface for classifying and answering travel requests.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tripagent::config::{load_config, load_config_from_path, validate_config, LogConfig};
use tripagent::tools::TerminateTool;
use tripagent::{
    Config, IntentRouter, LlmGateway, RequestDispatcher, ToolRegistry, UsageMonitor, VERSION,
};

#[derive(Parser)]
#[command(
    name = "tripagent",
    author = "TripAgent Contributors",
    version = VERSION,
    about = "TripAgent - agentic travel-planning orchestration",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, short, global = true, env = "TRIPAGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which path a request would take
    Classify {
        /// The request text
        text: String,
    },

    /// Handle a request end to end and print the result
    Ask {
        /// The request text
        text: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and report problems
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = load_config_from_path(path)?;
            dotenvy::dotenv().ok();
            tripagent::config::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            config
        }
        None => load_config()?,
    };
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }
    init_logging(&config.log);

    match cli.command {
        Commands::Classify { text } => classify(&config, &text).await,
        Commands::Ask { text, json } => ask(&config, &text, json).await,
        Commands::CheckConfig => check_config(&config),
    }
}

/// Install the tracing subscriber; `RUST_LOG` wins over the configured level
fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    if log.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_gateway(config: &Config) -> anyhow::Result<Arc<LlmGateway>> {
    let monitor = Arc::new(UsageMonitor::new(
        config.gateway.prompt_price_per_1k,
        config.gateway.completion_price_per_1k,
    ));
    let gateway =
        LlmGateway::new(&config.gateway, monitor).context("failed to create LLM gateway")?;
    Ok(Arc::new(gateway))
}

async fn classify(config: &Config, text: &str) -> anyhow::Result<()> {
    let router = IntentRouter::new(build_gateway(config)?, &config.flow);
    let classification = router.classify(text).await;

    println!("intent: {}", classification.intent);
    println!("source: {}", classification.source);
    Ok(())
}

async fn ask(config: &Config, text: &str, json: bool) -> anyhow::Result<()> {
    let gateway = build_gateway(config)?;

    let mut registry = ToolRegistry::new();
    registry.register(TerminateTool);
    let dispatcher = RequestDispatcher::from_config(config, gateway.clone(), Arc::new(registry));

    info!(version = VERSION, model = gateway.model(), "Handling request");
    let result = dispatcher.handle(text).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.output);
        let usage = gateway.monitor().snapshot();
        eprintln!(
            "\n[{}] {:.1}s, {} tasks, {} tokens, ~${:.4}",
            if result.success { "ok" } else { "failed" },
            result.execution_time_seconds,
            result.tasks_completed,
            usage.total_tokens(),
            usage.estimated_cost
        );
        for warning in result.warnings() {
            eprintln!("warning: {}", warning);
        }
    }

    if !result.success {
        anyhow::bail!("request failed");
    }
    Ok(())
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    let report = validate_config(config);

    for issue in &report.errors {
        println!("error   {}: {}", issue.path, issue.message);
        if let Some(suggestion) = &issue.suggestion {
            println!("        {}", suggestion);
        }
    }
    for issue in &report.warnings {
        println!("warning {}: {}", issue.path, issue.message);
        if let Some(suggestion) = &issue.suggestion {
            println!("        {}", suggestion);
        }
    }

    if report.valid {
        println!(
            "Configuration OK (model: {}, endpoint: {})",
            config.gateway.model, config.gateway.base_url
        );
        Ok(())
    } else {
        anyhow::bail!("configuration has {} error(s)", report.errors.len())
    }
}
