//! regexlab entrypoint.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use regexlab::assistant::{Language, models};
use regexlab::config::{Config, Settings};
use regexlab::repl::Repl;
use regexlab::state::Workspace;

#[derive(Parser)]
#[command(name = "regexlab")]
#[command(about = "Regex pipeline workbench with an AI assistant")]
struct Args {
    /// API key for the configured endpoint
    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,

    /// OpenAI-compatible proxy base URL; unset targets the native endpoint
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Display language: zh or en
    #[arg(long)]
    language: Option<String>,

    /// List available models and exit
    #[arg(long)]
    list_models: bool,

    /// Import a script JSON file before starting
    #[arg(long)]
    import: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Resolve values: CLI args > env vars (handled by clap) > config file.
    let config = Config::load();
    let language = match args.language.as_deref() {
        Some("en") => Language::En,
        Some("zh") => Language::Zh,
        Some(other) => anyhow::bail!("Unknown language: {other} (expected zh or en)"),
        None => config.language.unwrap_or_default(),
    };
    let settings = Settings {
        api_key: args.api_key.or(config.api_key),
        base_url: args.base_url.or(config.base_url),
        model: args.model.or(config.model),
        language,
    };

    if args.list_models {
        match models::list_models(&settings).await {
            Ok(models) => {
                for model in models {
                    println!("{model}");
                }
                return Ok(());
            }
            Err(e) => anyhow::bail!(e.user_message(settings.language)),
        }
    }

    let workspace = Workspace::with_defaults();
    if let Some(path) = &args.import {
        let json = std::fs::read_to_string(path)?;
        let count = workspace.import_json(&json)?;
        tracing::info!("imported {count} rule(s) from {path}");
    }

    Repl::new(workspace, settings)?.run().await
}
