//! shardtally CLI entry point

use anyhow::{Context, Result};
use shardtally::config::{cli::Cli, toml as config_toml, validator};
use shardtally::output::text::print_summary;
use shardtally::Coordinator;
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;
    init_logging(cli.debug);

    println!("shardtally v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let config = config_toml::resolve(&cli)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    // Fixed for the lifetime of the run
    let workers = num_cpus::get();

    println!("Configuration:");
    println!("{}", config);
    println!("  Workers:    {} (one per CPU)", workers);
    println!();

    if cli.dry_run {
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let coordinator = Coordinator::new(&config, workers, config.key.extractor())
        .context("Failed to create coordinator")?;

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let summary = runtime
        .block_on(coordinator.run())
        .with_context(|| format!("Run over {} failed", config.input.display()))?;

    println!();
    print_summary(&summary);
    Ok(())
}

/// Initialize tracing; `RUST_LOG` wins over `--debug`
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_thread_names(debug)
        .init();

    debug!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}
