//! Pool Scanner - lists every Uniswap V3 pool for a token
//!
//! Run with: cargo run --bin scan-pools -- [TOKEN] [--chain-id 8453] [--rpc-url URL]
//!
//! Unlike the metrics pipeline, which stops at the first pool, this checks
//! every quote token and fee tier and shows the token balance held by each.

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use dex_metrics::config::{parse_address, Settings};
use dex_metrics::logging::{init_tracing, TOOL_DIRECTIVES};
use dex_metrics::reader::{read_token_info, scan_pools, ChainClient, ChainConnector, RpcConnector};

#[derive(Parser)]
#[command(name = "scan-pools")]
#[command(about = "List every Uniswap V3 pool of a token", long_about = None)]
struct Cli {
    /// Token address (default: TOKEN_ADDRESS)
    token: Option<String>,

    #[arg(long)]
    chain_id: Option<u64>,

    #[arg(long)]
    rpc_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(TOOL_DIRECTIVES)?;

    let mut settings = Settings::from_env()?;
    if let Some(token) = &cli.token {
        settings.token = parse_address(token)?;
    }
    settings.chain_id = cli.chain_id.unwrap_or(settings.chain_id);
    settings.rpc_url = cli.rpc_url.or(settings.rpc_url);
    settings.validate()?;

    let table = settings.chain_table()?;
    let chain = table.get(settings.chain_id)?;
    let connector = RpcConnector::new(Duration::from_secs(settings.rpc_timeout_secs));

    println!();
    println!(
        "{}",
        style(format!(" Scanning pools for {} on {} ({})", settings.token, chain.name, chain.chain_id))
            .cyan()
            .bold()
    );
    println!();

    // First endpoint that answers
    let mut client: Option<Arc<dyn ChainClient>> = None;
    for endpoint in chain.endpoints(settings.rpc_url.as_deref()) {
        let candidate = match connector.connect(&endpoint) {
            Ok(c) => c,
            Err(e) => {
                warn!("{}: {}", endpoint.url, e);
                continue;
            }
        };
        match candidate.block_number().await {
            Ok(block) => {
                println!("RPC:   {} (block {})", style(&endpoint.url).dim(), block);
                client = Some(candidate);
                break;
            }
            Err(e) => warn!("{}: {}", endpoint.url, e),
        }
    }
    let client = client.ok_or_else(|| eyre!("No RPC endpoint for chain {} answered", chain.chain_id))?;
    let client = client.as_ref();

    let token = read_token_info(client, settings.token).await?;
    println!("Token: {} ({} decimals)", token.meta.symbol, token.meta.decimals);
    println!("{}", style("---").dim());

    let pools = scan_pools(client, chain, settings.token).await?;
    if pools.is_empty() {
        println!("{}", style("No pools found").red());
        return Ok(());
    }

    for pool in &pools {
        let quote_symbol = client.symbol(pool.quote).await.unwrap_or_else(|_| "?".to_string());
        let held = client.balance_of(settings.token, pool.address).await?;
        let held = dex_metrics::metrics::to_units(held, token.meta.decimals);

        println!("Pool found: {}", style(pool.address).green());
        println!("Fee tier:   {}", pool.fee);
        println!("Quote:      {} ({}, {})", quote_symbol, pool.quote, pool.quote_kind);
        println!("{} held:   {}", token.meta.symbol, held);
        println!("{}", style("---").dim());
    }

    println!("{} pool(s)", pools.len());
    Ok(())
}
