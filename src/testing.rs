//! Test doubles: an in-memory chain, a connector over several of them,
//! a fixed fiat rate and a local HTTP server helper.

use alloy_primitives::{address, Address, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::chains::{ChainConfig, ChainEndpoint};
use crate::error::MetricsError;
use crate::fiat::{FiatRate, FiatRateSource, FiatSource};
use crate::reader::{ChainClient, ChainConnector};

pub const TOKEN: Address = address!("69efd833288605f320d77eb2ab99dde62919bbc1");
/// Base WETH, the wrapped native quote of [`test_chain`]
pub const WETH: Address = address!("4200000000000000000000000000000000000006");

/// `n` whole tokens as a raw amount
pub fn units(n: u64, decimals: u8) -> U256 {
    U256::from(n) * U256::from(10u8).pow(U256::from(decimals))
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

/// Base chain row with the given RPC list
pub fn test_chain(urls: &[&str]) -> ChainConfig {
    let mut chain = ChainConfig::base();
    chain.rpc_urls = urls.iter().map(|u| u.to_string()).collect();
    chain
}

// ============================================
// FAKE CHAIN
// ============================================

#[derive(Debug, Clone)]
struct FakeToken {
    symbol: String,
    decimals: u8,
    total_supply: U256,
}

#[derive(Debug, Default)]
pub struct FakeChain {
    url: String,
    chain_id: u64,
    block: u64,
    down: bool,
    pools: HashMap<(Address, Address, u32), Address>,
    tokens: HashMap<Address, FakeToken>,
    balances: HashMap<(Address, Address), U256>,
    failing: HashSet<(Address, Address)>,
    get_pool_calls: Mutex<Vec<u32>>,
}

impl FakeChain {
    pub fn new(url: &str, chain_id: u64) -> Self {
        Self {
            url: url.to_string(),
            chain_id,
            block: 1_000,
            ..Default::default()
        }
    }

    /// Registered under both token orders, like the factory mapping
    pub fn with_pool(mut self, a: Address, b: Address, fee: u32, pool: Address) -> Self {
        self.pools.insert((a, b, fee), pool);
        self.pools.insert((b, a, fee), pool);
        self
    }

    pub fn with_token(mut self, token: Address, symbol: &str, decimals: u8, total_supply: U256) -> Self {
        self.tokens.insert(
            token,
            FakeToken {
                symbol: symbol.to_string(),
                decimals,
                total_supply,
            },
        );
        self
    }

    pub fn with_balance(mut self, token: Address, owner: Address, raw: U256) -> Self {
        self.balances.insert((token, owner), raw);
        self
    }

    pub fn failing_balance(mut self, token: Address, owner: Address) -> Self {
        self.failing.insert((token, owner));
        self
    }

    pub fn with_block(mut self, block: u64) -> Self {
        self.block = block;
        self
    }

    /// Every call fails with a transport error
    pub fn down(mut self) -> Self {
        self.down = true;
        self
    }

    /// Fee tiers probed through `get_pool`, in call order
    pub fn get_pool_fees(&self) -> Vec<u32> {
        self.get_pool_calls.lock().unwrap().clone()
    }

    fn check_up(&self, call: &str) -> Result<(), MetricsError> {
        if self.down {
            return Err(MetricsError::rpc(call, format!("{} connection refused", self.url)));
        }
        Ok(())
    }

    fn token(&self, token: Address, call: &str) -> Result<&FakeToken, MetricsError> {
        self.check_up(call)?;
        self.tokens
            .get(&token)
            .ok_or_else(|| MetricsError::rpc(call, "execution reverted"))
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn block_number(&self) -> Result<u64, MetricsError> {
        self.check_up("eth_blockNumber")?;
        Ok(self.block)
    }

    async fn chain_id(&self) -> Result<u64, MetricsError> {
        self.check_up("eth_chainId")?;
        Ok(self.chain_id)
    }

    async fn get_pool(
        &self,
        _factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Address, MetricsError> {
        self.check_up("getPool")?;
        self.get_pool_calls.lock().unwrap().push(fee);
        Ok(self
            .pools
            .get(&(token_a, token_b, fee))
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn symbol(&self, token: Address) -> Result<String, MetricsError> {
        Ok(self.token(token, "symbol")?.symbol.clone())
    }

    async fn decimals(&self, token: Address) -> Result<u8, MetricsError> {
        Ok(self.token(token, "decimals")?.decimals)
    }

    async fn total_supply(&self, token: Address) -> Result<U256, MetricsError> {
        Ok(self.token(token, "totalSupply")?.total_supply)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, MetricsError> {
        self.token(token, "balanceOf")?;
        if self.failing.contains(&(token, owner)) {
            return Err(MetricsError::rpc("balanceOf", "execution reverted"));
        }
        Ok(self.balances.get(&(token, owner)).copied().unwrap_or_default())
    }
}

// ============================================
// FAKE CONNECTOR
// ============================================

/// Hands out registered [`FakeChain`]s by URL and records every connect
#[derive(Default)]
pub struct FakeConnector {
    chains: HashMap<String, Arc<dyn ChainClient>>,
    connections: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(chains: impl IntoIterator<Item = FakeChain>) -> Self {
        Self {
            chains: chains
                .into_iter()
                .map(|c| (c.url.clone(), Arc::new(c) as Arc<dyn ChainClient>))
                .collect(),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Serve `url` with an arbitrary client, e.g. a real RPC client
    pub fn with_client(mut self, url: &str, client: Arc<dyn ChainClient>) -> Self {
        self.chains.insert(url.to_string(), client);
        self
    }

    pub fn connections(&self) -> Vec<String> {
        self.connections.lock().unwrap().clone()
    }
}

impl ChainConnector for FakeConnector {
    fn connect(&self, endpoint: &ChainEndpoint) -> Result<Arc<dyn ChainClient>, MetricsError> {
        self.connections.lock().unwrap().push(endpoint.url.clone());
        match self.chains.get(&endpoint.url) {
            Some(chain) => Ok(chain.clone()),
            None => Err(MetricsError::InvalidEndpoint {
                url: endpoint.url.clone(),
                reason: "unknown host".to_string(),
            }),
        }
    }
}

// ============================================
// FIXED FIAT
// ============================================

#[derive(Debug, Default)]
pub struct FixedFiat {
    rate: Option<f64>,
    calls: AtomicUsize,
}

impl FixedFiat {
    pub fn new(rate: Option<f64>) -> Self {
        Self {
            rate,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FiatRateSource for FixedFiat {
    async fn eth_eur(&self) -> Option<FiatRate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rate.map(|eth_eur| FiatRate {
            eth_eur,
            source: FiatSource::Coinbase,
        })
    }
}

// ============================================
// HTTP
// ============================================

/// Serve `app` on an ephemeral local port, returning its base URL
pub async fn spawn_http(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Accepts TCP connections and never answers; requests to it hang
pub async fn spawn_silent_tcp() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}
