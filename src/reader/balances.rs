//! ERC-20 reads: pool balances, token info, excluded holders

use alloy_primitives::{Address, U256};
use futures::future::join_all;
use tracing::{debug, warn};

use super::{BalanceSnapshot, ChainClient, PoolReference, PoolState, TokenInfo, TokenMeta, TokenSnapshot};
use crate::error::MetricsError;

/// Metadata and balance of `token` held by `holder`
async fn read_snapshot(
    client: &dyn ChainClient,
    token: Address,
    holder: Address,
) -> Result<TokenSnapshot, MetricsError> {
    let (symbol, decimals, raw) = tokio::try_join!(
        client.symbol(token),
        client.decimals(token),
        client.balance_of(token, holder),
    )?;

    Ok(TokenSnapshot {
        meta: TokenMeta {
            address: token,
            symbol,
            decimals,
        },
        balance: BalanceSnapshot {
            owner: holder,
            raw,
            decimals,
        },
    })
}

/// Both sides of `pool`: base `token` and the pool's quote token,
/// each as the balance held at the pool address
pub async fn read_pool_state(
    client: &dyn ChainClient,
    token: Address,
    pool: &PoolReference,
) -> Result<PoolState, MetricsError> {
    let (base, quote) = tokio::try_join!(
        read_snapshot(client, token, pool.address),
        read_snapshot(client, pool.quote, pool.address),
    )?;

    debug!(
        "Pool {}: {} {} / {} {}",
        pool.address,
        base.balance.amount(),
        base.meta.symbol,
        quote.balance.amount(),
        quote.meta.symbol
    );

    Ok(PoolState { base, quote })
}

pub async fn read_token_info(client: &dyn ChainClient, token: Address) -> Result<TokenInfo, MetricsError> {
    let (symbol, decimals, total_supply_raw) = tokio::try_join!(
        client.symbol(token),
        client.decimals(token),
        client.total_supply(token),
    )?;

    Ok(TokenInfo {
        meta: TokenMeta {
            address: token,
            symbol,
            decimals,
        },
        total_supply_raw,
    })
}

/// Block height and `holder`'s balance as one endpoint sees them,
/// for spotting lagging nodes
pub async fn probe_balance(
    client: &dyn ChainClient,
    token: Address,
    holder: Address,
) -> Result<(u64, BalanceSnapshot), MetricsError> {
    let (block, decimals, raw) = tokio::try_join!(
        client.block_number(),
        client.decimals(token),
        client.balance_of(token, holder),
    )?;

    Ok((
        block,
        BalanceSnapshot {
            owner: holder,
            raw,
            decimals,
        },
    ))
}

/// Balances of the excluded addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionReadout {
    /// Sum of the balances that could be read
    pub total_raw: U256,
    pub balances: Vec<(Address, U256)>,
    /// Addresses whose balance read failed; counted as zero
    pub unreadable: Vec<Address>,
}

/// Best-effort: a failed read is logged and skipped, never fatal.
/// The list is taken as given; a repeated address is counted twice.
pub async fn read_exclusions(client: &dyn ChainClient, token: Address, exclude: &[Address]) -> ExclusionReadout {
    let reads = exclude.iter().map(|owner| client.balance_of(token, *owner));
    let results = join_all(reads).await;

    let mut readout = ExclusionReadout::default();
    for (owner, result) in exclude.iter().copied().zip(results) {
        match result {
            Ok(raw) => {
                readout.total_raw = readout.total_raw.saturating_add(raw);
                readout.balances.push((owner, raw));
            }
            Err(e) => {
                warn!("Excluded address {} unreadable, counting as zero: {}", owner, e);
                readout.unreadable.push(owner);
            }
        }
    }

    readout
}
