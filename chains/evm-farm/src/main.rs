use evm_farm::config::FarmConfig;
use evm_farm::runner::FarmRunner;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use farm_core::setup_logger;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/evm-farm/config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // dropped at the end of main so the file writer flushes
    let _log_guard = setup_logger();
    dotenv().ok();

    let args = Args::parse();
    info!("Loading config from: {}", args.config);

    let config = match FarmConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return Ok(());
        }
    };

    println!(
        "{}",
        format!(
            "evm-farm | activity: {} | chain id: {}",
            config.activity, config.chain_id
        )
        .bold()
        .cyan()
    );
    info!(
        "Configuration loaded for chain ID: {}, activity: {}",
        config.chain_id, config.activity
    );

    let runner = FarmRunner::new(config)?;
    runner.run().await
}
