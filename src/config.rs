//! Runtime settings
//!
//! Read from the environment (and `.env`), then overridden per surface:
//! CLI flags for the one-shot binary, query parameters for the server.

use alloy_primitives::Address;
use eyre::{eyre, Result, WrapErr};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::info;

use crate::aggregator::MetricsRequest;
use crate::chains::{ChainTable, BASE_CHAIN_ID, DEFAULT_TOKEN};
use crate::fiat::DEFAULT_FIAT_TIMEOUT_SECS;

pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

pub const DEFAULT_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    // ========== Request ==========
    /// Token to measure when none is given
    pub token: Address,

    pub chain_id: u64,

    /// Sole RPC endpoint; unset means the chain's public list
    pub rpc_url: Option<String>,

    /// Holders subtracted from circulating supply
    pub exclude_addresses: Vec<Address>,

    // ========== Timeouts ==========
    /// Per chain call
    pub rpc_timeout_secs: u64,

    /// Per fiat price request
    pub fiat_timeout_secs: u64,

    // ========== Chains ==========
    /// TOML chain table replacing the built-in one
    pub chains_file: Option<String>,

    // ========== HTTP ==========
    pub bind_addr: String,

    pub cache_control: String,
}

impl Settings {
    /// Load settings from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build settings from any variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            token: match non_empty("TOKEN_ADDRESS") {
                Some(s) => parse_address(&s).wrap_err("Invalid TOKEN_ADDRESS")?,
                None => DEFAULT_TOKEN,
            },
            chain_id: match non_empty("CHAIN_ID") {
                Some(s) => s.parse::<u64>().wrap_err_with(|| format!("Invalid CHAIN_ID {:?}", s))?,
                None => BASE_CHAIN_ID,
            },
            rpc_url: non_empty("ETH_RPC_URL"),
            exclude_addresses: match non_empty("EXCLUDE_ADDRESSES") {
                Some(s) => parse_address_list(&s).wrap_err("Invalid EXCLUDE_ADDRESSES")?,
                None => vec![],
            },
            rpc_timeout_secs: non_empty("RPC_TIMEOUT_SECS")
                .unwrap_or_else(|| DEFAULT_RPC_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_RPC_TIMEOUT_SECS),
            fiat_timeout_secs: non_empty("FIAT_TIMEOUT_SECS")
                .unwrap_or_else(|| DEFAULT_FIAT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_FIAT_TIMEOUT_SECS),
            chains_file: non_empty("CHAINS_FILE"),
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            cache_control: non_empty("CACHE_CONTROL").unwrap_or_else(|| DEFAULT_CACHE_CONTROL.to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_timeout_secs == 0 {
            return Err(eyre!("RPC_TIMEOUT_SECS must be at least 1"));
        }
        if self.fiat_timeout_secs == 0 {
            return Err(eyre!("FIAT_TIMEOUT_SECS must be at least 1"));
        }
        if let Some(url) = &self.rpc_url {
            reqwest::Url::parse(url).wrap_err_with(|| format!("Invalid ETH_RPC_URL {:?}", url))?;
        }
        SocketAddr::from_str(&self.bind_addr)
            .wrap_err_with(|| format!("Invalid BIND_ADDR {:?}", self.bind_addr))?;

        Ok(())
    }

    /// Chain table from `chains_file`, or the built-in one
    pub fn chain_table(&self) -> Result<ChainTable> {
        match &self.chains_file {
            Some(path) => ChainTable::from_file(path).wrap_err_with(|| format!("Failed to load CHAINS_FILE {}", path)),
            None => Ok(ChainTable::builtin()),
        }
    }

    pub fn metrics_request(&self) -> MetricsRequest {
        MetricsRequest {
            token: self.token,
            chain_id: self.chain_id,
            rpc_url: self.rpc_url.clone(),
            exclude: self.exclude_addresses.clone(),
        }
    }

    pub fn log_summary(&self) {
        info!("Token:        {}", self.token);
        info!("Chain ID:     {}", self.chain_id);
        info!(
            "RPC:          {}",
            self.rpc_url.as_deref().unwrap_or("chain defaults (failover)")
        );
        info!("Excluded:     {} address(es)", self.exclude_addresses.len());
        info!(
            "Timeouts:     rpc {}s, fiat {}s",
            self.rpc_timeout_secs, self.fiat_timeout_secs
        );
        if let Some(path) = &self.chains_file {
            info!("Chain table:  {}", path);
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN,
            chain_id: BASE_CHAIN_ID,
            rpc_url: None,
            exclude_addresses: vec![],
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            fiat_timeout_secs: DEFAULT_FIAT_TIMEOUT_SECS,
            chains_file: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
        }
    }
}

/// Hex address, any letter case
pub fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s.trim()).map_err(|e| eyre!("{:?} is not an address: {}", s.trim(), e))
}

/// Comma separated addresses; blanks are skipped, duplicates kept
pub fn parse_address_list(s: &str) -> Result<Vec<Address>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_address)
        .collect()
}

// ============================================
// TESTS
// ============================================
