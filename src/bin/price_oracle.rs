//! Price Oracle CLI
//!
//! Operator tool for checking feeds and resolving the current price.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use rust_decimal::Decimal;

use price_oracle::oracle::{OracleConfig, OracleService, QuoteSource};

/// Price Oracle CLI - multi-source ETH/USD price with fallbacks
#[derive(Parser)]
#[command(name = "price-oracle")]
#[command(version = price_oracle::VERSION)]
#[command(about = "Resolve and inspect the ETH/USD oracle price", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// JSON configuration file; environment variables are used when absent
    #[arg(short, long, env = "PRICE_ORACLE_CONFIG")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the current price through the full fallback chain
    Price,

    /// List configured feeds in attempt order
    Feeds,

    /// Show the effective configuration
    Config,

    /// Convert an amount of ETH to a USD charge
    Convert {
        /// Amount of ETH, e.g. 0.05
        amount: Decimal,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run_command(&cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<OracleConfig> {
    let config = match &cli.config {
        Some(path) => OracleConfig::load(path)?,
        None => OracleConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

async fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;

    match &cli.command {
        Commands::Price => cmd_price(cli, config).await,
        Commands::Feeds => cmd_feeds(cli, &config),
        Commands::Config => cmd_config(&config),
        Commands::Convert { amount } => cmd_convert(cli, config, *amount).await,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn source_label(source: QuoteSource) -> String {
    if source.is_degraded() {
        style(source.to_string()).yellow().to_string()
    } else {
        style(source.to_string()).green().to_string()
    }
}

async fn cmd_price(cli: &Cli, config: OracleConfig) -> anyhow::Result<()> {
    let oracle = OracleService::new(config)?;
    let quote = oracle.quote().await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
        return Ok(());
    }

    println!(
        "{} ETH/USD {} via {}{}",
        style("✓").green(),
        style(quote.price.format_usd()).bold(),
        source_label(quote.source),
        quote
            .provider
            .as_deref()
            .map(|p| format!(" ({})", p))
            .unwrap_or_default()
    );
    Ok(())
}

fn cmd_feeds(cli: &Cli, config: &OracleConfig) -> anyhow::Result<()> {
    let registry = config.registry()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(registry.list())?);
        return Ok(());
    }

    println!("{}", style("Price feeds (attempt order)").bold().underlined());
    for feed in registry.list() {
        println!(
            "  {:>3}  {:<12} {}",
            feed.priority,
            style(&feed.name).cyan(),
            feed.endpoint
        );
    }
    Ok(())
}

fn cmd_config(config: &OracleConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

async fn cmd_convert(cli: &Cli, config: OracleConfig, amount: Decimal) -> anyhow::Result<()> {
    let oracle = OracleService::new(config)?;
    let conversion = oracle.convert_to_usd(amount).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&conversion)?);
        return Ok(());
    }

    println!(
        "{} {} ETH = {} (rate {} via {})",
        style("✓").green(),
        conversion.asset_amount,
        style(format!("${:.2}", conversion.usd_amount)).bold(),
        conversion.rate.format_usd(),
        source_label(conversion.source)
    );
    Ok(())
}
