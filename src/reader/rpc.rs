//! JSON-RPC chain client
//!
//! Plain `eth_call`s against the factory and ERC-20 contracts, each one
//! bounded by an explicit timeout.

use alloy_primitives::{aliases::U24, Address, Bytes, B256, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use alloy_transport::TransportError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::{ChainClient, ChainConnector};
use crate::chains::ChainEndpoint;
use crate::error::MetricsError;

// ============================================
// CONTRACT INTERFACES
// ============================================

sol! {
    interface IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    }

    interface IERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }
}

// ============================================
// RPC CLIENT
// ============================================

pub struct RpcChainClient {
    url: String,
    provider: DynProvider,
    call_timeout: Duration,
}

impl RpcChainClient {
    pub fn connect(url: &str, call_timeout: Duration) -> Result<Self, MetricsError> {
        let parsed: reqwest::Url = url.parse().map_err(|e| MetricsError::InvalidEndpoint {
            url: url.to_string(),
            reason: format!("{}", e),
        })?;

        let provider = ProviderBuilder::new().connect_http(parsed).erased();

        Ok(Self {
            url: url.to_string(),
            provider,
            call_timeout,
        })
    }

    /// Bound a call by `call_timeout`
    async fn timed<T, F>(&self, call: &str, fut: F) -> Result<T, MetricsError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result.map_err(|e| MetricsError::rpc(call, e)),
            Err(_) => Err(MetricsError::Timeout {
                call: call.to_string(),
                after: self.call_timeout,
            }),
        }
    }

    async fn call_contract(&self, to: Address, calldata: Vec<u8>, call: &str) -> Result<Bytes, MetricsError> {
        trace!("eth_call {} -> {} via {}", call, to, self.url);

        let tx = TransactionRequest::default()
            .to(to)
            .input(calldata.into());

        self.timed(call, async { self.provider.call(tx).await }).await
    }
}

/// `symbol()` is `string` for most tokens and `bytes32` for a few old ones
fn decode_symbol(data: &[u8]) -> Result<String, MetricsError> {
    if let Ok(symbol) = IERC20::symbolCall::abi_decode_returns(data) {
        return Ok(symbol);
    }

    if data.len() == 32 {
        let word = B256::from_slice(data);
        let trimmed: Vec<u8> = word.iter().copied().take_while(|b| *b != 0).collect();
        if let Ok(symbol) = String::from_utf8(trimmed) {
            return Ok(symbol);
        }
    }

    Err(MetricsError::decode("symbol", "neither string nor bytes32"))
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn block_number(&self) -> Result<u64, MetricsError> {
        self.timed("eth_blockNumber", self.provider.get_block_number()).await
    }

    async fn chain_id(&self) -> Result<u64, MetricsError> {
        self.timed("eth_chainId", self.provider.get_chain_id()).await
    }

    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Address, MetricsError> {
        let calldata = IUniswapV3Factory::getPoolCall {
            tokenA: token_a,
            tokenB: token_b,
            fee: U24::from(fee),
        }
        .abi_encode();

        let result = self.call_contract(factory, calldata, "getPool").await?;

        IUniswapV3Factory::getPoolCall::abi_decode_returns(&result)
            .map_err(|e| MetricsError::decode("getPool", e))
    }

    async fn symbol(&self, token: Address) -> Result<String, MetricsError> {
        let result = self
            .call_contract(token, IERC20::symbolCall {}.abi_encode(), "symbol")
            .await?;
        decode_symbol(&result)
    }

    async fn decimals(&self, token: Address) -> Result<u8, MetricsError> {
        let result = self
            .call_contract(token, IERC20::decimalsCall {}.abi_encode(), "decimals")
            .await?;

        IERC20::decimalsCall::abi_decode_returns(&result)
            .map_err(|e| MetricsError::decode("decimals", e))
    }

    async fn total_supply(&self, token: Address) -> Result<U256, MetricsError> {
        let result = self
            .call_contract(token, IERC20::totalSupplyCall {}.abi_encode(), "totalSupply")
            .await?;

        IERC20::totalSupplyCall::abi_decode_returns(&result)
            .map_err(|e| MetricsError::decode("totalSupply", e))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, MetricsError> {
        let calldata = IERC20::balanceOfCall { account: owner }.abi_encode();
        let result = self.call_contract(token, calldata, "balanceOf").await?;

        IERC20::balanceOfCall::abi_decode_returns(&result)
            .map_err(|e| MetricsError::decode("balanceOf", e))
    }
}

// ============================================
// CONNECTOR
// ============================================

/// Opens [`RpcChainClient`]s with a shared per-call timeout
#[derive(Debug, Clone)]
pub struct RpcConnector {
    call_timeout: Duration,
}

impl RpcConnector {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }
}

impl ChainConnector for RpcConnector {
    fn connect(&self, endpoint: &ChainEndpoint) -> Result<Arc<dyn ChainClient>, MetricsError> {
        let client = RpcChainClient::connect(&endpoint.url, self.call_timeout)?;
        Ok(Arc::new(client))
    }
}
