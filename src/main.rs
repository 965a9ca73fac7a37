//! dex-metrics - one-shot token metrics
//!
//! Run with: cargo run -- [TOKEN] [--chain-id 8453] [--rpc-url URL] [--exclude A,B]
//!
//! Prints a single JSON document on stdout. Logs go to stderr.

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::debug;

use dex_metrics::config::{parse_address, parse_address_list, Settings};
use dex_metrics::logging::{init_tracing, CLI_DIRECTIVES};
use dex_metrics::MetricsAggregator;

#[derive(Parser)]
#[command(name = "dex-metrics")]
#[command(about = "Uniswap V3 token metrics: price, supply, market cap", long_about = None)]
struct Cli {
    /// Token address (default: TOKEN_ADDRESS)
    token: Option<String>,

    /// Chain id (default: CHAIN_ID, then 8453)
    #[arg(long)]
    chain_id: Option<u64>,

    /// Use only this RPC endpoint (default: ETH_RPC_URL, then the chain's public list)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Comma separated holders to exclude from circulating supply
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

impl Cli {
    /// Flags win over the environment
    fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(token) = &self.token {
            settings.token = parse_address(token)?;
        }
        if let Some(chain_id) = self.chain_id {
            settings.chain_id = chain_id;
        }
        if let Some(rpc_url) = &self.rpc_url {
            settings.rpc_url = Some(rpc_url.clone());
        }
        if !self.exclude.is_empty() {
            settings.exclude_addresses = parse_address_list(&self.exclude.join(","))?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    init_tracing(CLI_DIRECTIVES)?;

    let mut settings = Settings::from_env()?;
    cli.apply(&mut settings)?;
    settings.validate()?;
    settings.log_summary();

    let aggregator = MetricsAggregator::from_settings(&settings)?;
    let result = aggregator.compute(&settings.metrics_request()).await?;
    debug!("Computed via {}", result.provenance.rpc_url);

    let json = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", json);

    Ok(())
}
