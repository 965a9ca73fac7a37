//! Chain Reader
//!
//! Resolves the Uniswap V3 pool for a token and reads the ERC-20 state the
//! metrics are derived from. Everything goes through [`ChainClient`], so
//! the pipeline can run against a live node ([`RpcChainClient`]) or a fake.

mod balances;
mod discovery;
mod rpc;

pub use balances::{probe_balance, read_exclusions, read_pool_state, read_token_info, ExclusionReadout};
pub use discovery::{find_pool, scan_pools};
pub use rpc::{RpcChainClient, RpcConnector};

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;

use crate::chains::{ChainEndpoint, QuoteKind};
use crate::error::MetricsError;

// ============================================
// CHAIN ACCESS
// ============================================

/// Read-only view of one chain through one endpoint
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Endpoint URL, recorded as provenance
    fn endpoint(&self) -> &str;

    async fn block_number(&self) -> Result<u64, MetricsError>;

    async fn chain_id(&self) -> Result<u64, MetricsError>;

    /// Factory `getPool`; the zero address means "no pool"
    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Address, MetricsError>;

    async fn symbol(&self, token: Address) -> Result<String, MetricsError>;

    async fn decimals(&self, token: Address) -> Result<u8, MetricsError>;

    async fn total_supply(&self, token: Address) -> Result<U256, MetricsError>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, MetricsError>;
}

/// Opens a [`ChainClient`] for an endpoint
pub trait ChainConnector: Send + Sync {
    fn connect(&self, endpoint: &ChainEndpoint) -> Result<Arc<dyn ChainClient>, MetricsError>;
}

// ============================================
// TYPES
// ============================================

/// Outcome of pool discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReference {
    pub address: Address,
    pub quote: Address,
    pub quote_kind: QuoteKind,
    /// Fee in hundredths of a bip (3000 = 0.3%)
    pub fee: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Raw ERC-20 balance of `owner`, with the decimals needed to scale it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub owner: Address,
    pub raw: U256,
    pub decimals: u8,
}

impl BalanceSnapshot {
    /// Display value, not exact
    pub fn amount(&self) -> f64 {
        crate::metrics::to_units(self.raw, self.decimals)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub meta: TokenMeta,
    pub balance: BalanceSnapshot,
}

/// Both sides of the pool, measured as balances held at the pool address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub base: TokenSnapshot,
    pub quote: TokenSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub meta: TokenMeta,
    pub total_supply_raw: U256,
}
