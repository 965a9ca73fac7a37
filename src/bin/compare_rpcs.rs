//! RPC Freshness Check - same read, every endpoint
//!
//! Run with: cargo run --bin compare-rpcs -- [TOKEN] [--pool ADDR] [--chain-id 8453]
//!
//! Prints each endpoint's block height and the token balance at the pool.
//! A node that trails the others shows an older block and a stale balance.

use alloy_primitives::Address;
use clap::Parser;
use color_eyre::eyre::Result;
use console::style;
use std::time::{Duration, Instant};

use dex_metrics::config::{parse_address, Settings};
use dex_metrics::logging::{init_tracing, TOOL_DIRECTIVES};
use dex_metrics::reader::{find_pool, probe_balance, ChainConnector, RpcConnector};

#[derive(Parser)]
#[command(name = "compare-rpcs")]
#[command(about = "Compare block height and pool balance across a chain's RPC endpoints", long_about = None)]
struct Cli {
    /// Token address (default: TOKEN_ADDRESS)
    token: Option<String>,

    /// Holder to read; defaults to the token's discovered pool
    #[arg(long)]
    pool: Option<String>,

    #[arg(long)]
    chain_id: Option<u64>,
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
    settings.validate()?;

    let table = settings.chain_table()?;
    let chain = table.get(settings.chain_id)?;
    let connector = RpcConnector::new(Duration::from_secs(settings.rpc_timeout_secs));
    let endpoints = chain.endpoints(None);

    println!();
    println!(
        "{}",
        style(format!(" Checking {} across {} RPC endpoint(s)", settings.token, endpoints.len()))
            .cyan()
            .bold()
    );
    println!();

    let mut holder: Option<Address> = cli.pool.as_deref().map(parse_address).transpose()?;
    let mut heights = Vec::new();

    for endpoint in &endpoints {
        let started = Instant::now();
        let client = match connector.connect(endpoint) {
            Ok(c) => c,
            Err(e) => {
                println!("RPC {} failed: {}", endpoint.url, style(e).red());
                println!("{}", style("---").dim());
                continue;
            }
        };

        let pool = match holder {
            Some(pool) => pool,
            None => match find_pool(client.as_ref(), chain, settings.token).await {
                Ok(found) => {
                    println!("Pool: {} (fee {})", found.address, found.fee);
                    holder = Some(found.address);
                    found.address
                }
                Err(e) => {
                    println!("RPC {} failed: {}", endpoint.url, style(e).red());
                    println!("{}", style("---").dim());
                    continue;
                }
            },
        };

        match probe_balance(client.as_ref(), settings.token, pool).await {
            Ok((block, balance)) => {
                println!("RPC:     {}", endpoint.url);
                println!("Block:   {}", block);
                println!("In pool: {}", balance.amount());
                println!("Latency: {:?}", started.elapsed());
                heights.push((endpoint.url.clone(), block));
            }
            Err(e) => println!("RPC {} failed: {}", endpoint.url, style(e).red()),
        }
        println!("{}", style("---").dim());
    }

    if let Some(best) = heights.iter().map(|(_, b)| *b).max() {
        for (url, block) in &heights {
            if *block < best {
                println!("{} {} is {} block(s) behind", style("!").yellow(), url, best - block);
            }
        }
    }

    Ok(())
}
