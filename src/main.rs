mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use mediafetch::api;
use mediafetch::config::Config;
use mediafetch::engine::Engine;
use mediafetch::reference::MediaRef;
use tracing::{error, info};

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    mediafetch::observability::init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_with_secrets(path.clone())?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Serve(args) => api::run(config, args.address).await,
        command => run_once(&config, command).await,
    }
}

/// One-shot commands against a freshly prepared engine
async fn run_once(config: &Config, command: Commands) -> Result<(), AnyError> {
    let engine = Engine::from_config(config)?;
    engine.prepare().await;

    match command {
        Commands::Fetch(args) => {
            let result = engine
                .acquire(&args.input, args.media_kind(), args.deadline())
                .await?;
            print_json(&result)?;
            if !result.success {
                error!(input = %args.input, "Acquisition failed");
                std::process::exit(1);
            }
        }
        Commands::Info(args) => {
            print_json(&engine.info(&args.input).await?)?;
        }
        Commands::Formats(args) => {
            let media = MediaRef::resolve(&args.input)?;
            print_json(&engine.metadata().formats(&media).await)?;
        }
        Commands::Search(args) => match args.index {
            Some(index) => print_json(&engine.metadata().search_nth(&args.query, index).await)?,
            None => print_json(&engine.metadata().search(&args.query, args.limit).await)?,
        },
        Commands::Playlist(args) => {
            for id in engine.metadata().playlist(&args.link, args.limit).await {
                println!("{}", id);
            }
        }
        Commands::RefreshCookies => {
            if engine.refresh_credentials().await {
                let pool = engine.credentials();
                info!(dir = %pool.dir().display(), files = pool.len(), "Credential pool refreshed");
            } else {
                error!("Credential refresh failed");
                std::process::exit(1);
            }
        }
        Commands::Serve(_) => {}
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AnyError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
