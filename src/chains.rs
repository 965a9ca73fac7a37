//! Chain table: factory, quote tokens, fee tiers and default RPCs per chain id
//!
//! The table is a plain value handed to the aggregator at construction
//! time. The built-in rows cover Base (primary) and Ethereum mainnet; a
//! TOML file can replace them (see [`ChainTable::from_file`]).

use alloy_primitives::{address, Address};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::MetricsError;

// ============================================
// CONSTANTS
// ============================================

pub const BASE_CHAIN_ID: u64 = 8453;
pub const ETHEREUM_CHAIN_ID: u64 = 1;

/// Uniswap V3 fee tiers, probed in ascending order
pub const DEFAULT_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

/// Fees are uint24 hundredths of a bip; 100% is out of range
const MAX_FEE: u32 = 1_000_000;

/// D.FAITH on Base, the token this service was built for
pub const DEFAULT_TOKEN: Address = address!("69efd833288605f320d77eb2ab99dde62919bbc1");

/// Public Base endpoints, official node first
const BASE_RPC_URLS: [&str; 4] = [
    "https://mainnet.base.org",
    "https://base.llamarpc.com",
    "https://base.blockpi.network/v1/rpc/public",
    "https://1rpc.io/base",
];

const ETHEREUM_RPC_URLS: [&str; 3] = [
    "https://eth.llamarpc.com",
    "https://ethereum-rpc.publicnode.com",
    "https://1rpc.io/eth",
];

// ============================================
// TYPES
// ============================================

/// Role of a quote token, decides whether fiat conversion applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuoteKind {
    WrappedNative,
    Stablecoin,
}

impl fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteKind::WrappedNative => write!(f, "wrapped native"),
            QuoteKind::Stablecoin => write!(f, "stablecoin"),
        }
    }
}

/// One candidate connection target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    pub url: String,
    pub chain_id: u64,
}

impl fmt::Display for ChainEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (chain {})", self.url, self.chain_id)
    }
}

fn default_fee_tiers() -> Vec<u32> {
    DEFAULT_FEE_TIERS.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    /// Uniswap V3 factory
    pub factory: Address,
    /// Canonical wrapped native token (WETH on Base and mainnet)
    pub wrapped_native: Address,
    /// Canonical stablecoin, second quote candidate
    #[serde(default)]
    pub stablecoin: Option<Address>,
    #[serde(default = "default_fee_tiers")]
    pub fee_tiers: Vec<u32>,
    /// Public RPC endpoints in priority order
    #[serde(default)]
    pub rpc_urls: Vec<String>,
}

impl ChainConfig {
    pub fn base() -> Self {
        Self {
            chain_id: BASE_CHAIN_ID,
            name: "base".to_string(),
            factory: address!("33128a8fc17869897dce68ed026d694621f6fdfd"),
            wrapped_native: address!("4200000000000000000000000000000000000006"),
            stablecoin: Some(address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913")),
            fee_tiers: default_fee_tiers(),
            rpc_urls: BASE_RPC_URLS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn ethereum() -> Self {
        Self {
            chain_id: ETHEREUM_CHAIN_ID,
            name: "ethereum".to_string(),
            factory: address!("1f98431c8ad98523631ae4a59f267346ea31f984"),
            wrapped_native: address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            stablecoin: Some(address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")),
            fee_tiers: default_fee_tiers(),
            rpc_urls: ETHEREUM_RPC_URLS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Quote tokens in preference order: wrapped native, then stablecoin
    pub fn quote_candidates(&self) -> Vec<(Address, QuoteKind)> {
        let mut quotes = vec![(self.wrapped_native, QuoteKind::WrappedNative)];
        if let Some(stable) = self.stablecoin {
            quotes.push((stable, QuoteKind::Stablecoin));
        }
        quotes
    }

    /// Fee tiers ascending, duplicates removed
    pub fn sorted_fee_tiers(&self) -> Vec<u32> {
        let mut tiers = self.fee_tiers.clone();
        tiers.sort_unstable();
        tiers.dedup();
        tiers
    }

    /// Ordered endpoint list. An explicit override is the only candidate.
    pub fn endpoints(&self, rpc_override: Option<&str>) -> Vec<ChainEndpoint> {
        match rpc_override {
            Some(url) => vec![ChainEndpoint {
                url: url.to_string(),
                chain_id: self.chain_id,
            }],
            None => self
                .rpc_urls
                .iter()
                .map(|url| ChainEndpoint {
                    url: url.clone(),
                    chain_id: self.chain_id,
                })
                .collect(),
        }
    }

    /// A row without factory or fee tiers is as good as no row at all
    pub fn validate(&self) -> std::result::Result<(), MetricsError> {
        if self.factory == Address::ZERO
            || self.wrapped_native == Address::ZERO
            || self.fee_tiers.is_empty()
            || self.fee_tiers.iter().any(|fee| *fee >= MAX_FEE)
        {
            return Err(MetricsError::UnsupportedChain(self.chain_id));
        }
        Ok(())
    }
}

// ============================================
// CHAIN TABLE
// ============================================

#[derive(Debug, Deserialize)]
struct ChainFile {
    chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct ChainTable {
    chains: HashMap<u64, ChainConfig>,
}

impl ChainTable {
    pub fn new(chains: impl IntoIterator<Item = ChainConfig>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.chain_id, c)).collect(),
        }
    }

    /// Base and Ethereum mainnet
    pub fn builtin() -> Self {
        Self::new([ChainConfig::base(), ChainConfig::ethereum()])
    }

    /// Load a chain table from a TOML file with `[[chains]]` entries
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ChainFile = toml::from_str(content)?;
        Ok(Self::new(file.chains))
    }

    /// Configured chain, or `UnsupportedChain`
    pub fn get(&self, chain_id: u64) -> std::result::Result<&ChainConfig, MetricsError> {
        let chain = self
            .chains
            .get(&chain_id)
            .ok_or(MetricsError::UnsupportedChain(chain_id))?;
        chain.validate()?;
        Ok(chain)
    }

    pub fn insert(&mut self, chain: ChainConfig) {
        self.chains.insert(chain.chain_id, chain);
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }
}
