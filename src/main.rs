use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tweetprune::Config;

#[derive(Parser)]
#[command(name = "tweetprune")]
#[command(about = "Delete old, low-engagement tweets listed in an archive export")]
#[command(version)]
struct Cli {
    /// Path to the config file (`key=value` properties, or `.toml`)
    config: PathBuf,

    /// Report which tweets would be deleted without calling the API
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tweetprune=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    println!("{:#?}", config);

    if cli.dry_run {
        tracing::info!("Dry run, no tweets will be deleted");
    }

    tweetprune::execute(&config, cli.dry_run, |outcome| println!("{outcome}"))
        .await
        .context("Run aborted")?;

    println!("DONE");
    Ok(())
}
