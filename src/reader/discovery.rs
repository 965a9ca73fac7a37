//! Pool discovery against the Uniswap V3 factory
//!
//! Deterministic: quote candidates in preference order, fee tiers
//! ascending, first non-zero `getPool` wins. No ranking by liquidity.

use alloy_primitives::Address;
use tracing::{debug, info, trace};

use super::{ChainClient, PoolReference};
use crate::chains::ChainConfig;
use crate::error::MetricsError;

pub async fn find_pool(
    client: &dyn ChainClient,
    chain: &ChainConfig,
    token: Address,
) -> Result<PoolReference, MetricsError> {
    chain.validate()?;
    let fee_tiers = chain.sorted_fee_tiers();

    for (quote, quote_kind) in chain.quote_candidates() {
        if quote == token {
            debug!("Skipping quote {} ({}): same as base token", quote, quote_kind);
            continue;
        }

        for &fee in &fee_tiers {
            let pool = client.get_pool(chain.factory, token, quote, fee).await?;

            if pool != Address::ZERO {
                info!("Found pool {} ({} quote {}, fee {})", pool, quote_kind, quote, fee);
                return Ok(PoolReference {
                    address: pool,
                    quote,
                    quote_kind,
                    fee,
                });
            }

            trace!("No pool for {}/{} at fee {}", token, quote, fee);
        }
    }

    Err(MetricsError::NoPoolFound {
        token,
        chain_id: chain.chain_id,
    })
}

/// Every existing (quote, fee) pool for `token`, in search order
pub async fn scan_pools(
    client: &dyn ChainClient,
    chain: &ChainConfig,
    token: Address,
) -> Result<Vec<PoolReference>, MetricsError> {
    chain.validate()?;
    let fee_tiers = chain.sorted_fee_tiers();
    let mut pools = Vec::new();

    for (quote, quote_kind) in chain.quote_candidates() {
        if quote == token {
            continue;
        }
        for &fee in &fee_tiers {
            let pool = client.get_pool(chain.factory, token, quote, fee).await?;
            if pool != Address::ZERO {
                pools.push(PoolReference {
                    address: pool,
                    quote,
                    quote_kind,
                    fee,
                });
            }
        }
    }

    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::QuoteKind;
    use crate::testing::{test_chain, FakeChain, TOKEN};
    use alloy_primitives::address;

    const POOL_A: Address = address!("00000000000000000000000000000000000000a1");
    const POOL_B: Address = address!("00000000000000000000000000000000000000b2");

    #[tokio::test]
    async fn test_wrapped_native_preferred_over_stablecoin() {
        let chain = test_chain(&["http://node"]);
        let stable = chain.stablecoin.unwrap();
        let fake = FakeChain::new("http://node", chain.chain_id)
            .with_pool(TOKEN, stable, 500, POOL_B)
            .with_pool(TOKEN, chain.wrapped_native, 10000, POOL_A);

        let pool = find_pool(&fake, &chain, TOKEN).await.unwrap();
        assert_eq!(pool.address, POOL_A);
        assert_eq!(pool.quote, chain.wrapped_native);
        assert_eq!(pool.quote_kind, QuoteKind::WrappedNative);
        assert_eq!(pool.fee, 10000);
    }

    #[tokio::test]
    async fn test_lowest_fee_tier_wins_and_search_stops() {
        let chain = test_chain(&["http://node"]);
        let fake = FakeChain::new("http://node", chain.chain_id)
            .with_pool(TOKEN, chain.wrapped_native, 500, POOL_A)
            .with_pool(TOKEN, chain.wrapped_native, 3000, POOL_B);

        let pool = find_pool(&fake, &chain, TOKEN).await.unwrap();
        assert_eq!(pool.fee, 500);
        assert_eq!(pool.address, POOL_A);

        // 100 probed first, then 500 hits; nothing after that
        assert_eq!(fake.get_pool_fees(), vec![100, 500]);
    }

    #[tokio::test]
    async fn test_falls_back_to_stablecoin() {
        let chain = test_chain(&["http://node"]);
        let stable = chain.stablecoin.unwrap();
        let fake = FakeChain::new("http://node", chain.chain_id).with_pool(TOKEN, stable, 3000, POOL_B);

        let pool = find_pool(&fake, &chain, TOKEN).await.unwrap();
        assert_eq!(pool.quote, stable);
        assert_eq!(pool.quote_kind, QuoteKind::Stablecoin);
        assert_eq!(fake.get_pool_fees(), vec![100, 500, 3000, 10000, 100, 500, 3000]);
    }

    #[tokio::test]
    async fn test_no_pool_found() {
        let chain = test_chain(&["http://node"]);
        let fake = FakeChain::new("http://node", chain.chain_id);

        let err = find_pool(&fake, &chain, TOKEN).await.unwrap_err();
        assert!(matches!(err, MetricsError::NoPoolFound { token, chain_id } if token == TOKEN && chain_id == chain.chain_id));
        assert_eq!(fake.get_pool_fees().len(), 8);
    }

    #[tokio::test]
    async fn test_quote_equal_to_token_is_skipped() {
        let chain = test_chain(&["http://node"]);
        let weth = chain.wrapped_native;
        let stable = chain.stablecoin.unwrap();
        let fake = FakeChain::new("http://node", chain.chain_id).with_pool(weth, stable, 500, POOL_A);

        let pool = find_pool(&fake, &chain, weth).await.unwrap();
        assert_eq!(pool.quote, stable);
        assert_eq!(fake.get_pool_fees(), vec![100, 500]);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let chain = test_chain(&["http://node"]);
        let fake = FakeChain::new("http://node", chain.chain_id).down();

        let err = find_pool(&fake, &chain, TOKEN).await.unwrap_err();
        assert!(matches!(err, MetricsError::Rpc { .. }));
    }

    #[tokio::test]
    async fn test_scan_lists_every_pool() {
        let chain = test_chain(&["http://node"]);
        let stable = chain.stablecoin.unwrap();
        let fake = FakeChain::new("http://node", chain.chain_id)
            .with_pool(TOKEN, chain.wrapped_native, 3000, POOL_A)
            .with_pool(TOKEN, stable, 100, POOL_B);

        let pools = scan_pools(&fake, &chain, TOKEN).await.unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!((pools[0].address, pools[0].fee), (POOL_A, 3000));
        assert_eq!((pools[1].address, pools[1].fee), (POOL_B, 100));
    }
}
