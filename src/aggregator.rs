//! Metrics Aggregator
//!
//! Runs the read pipeline against each endpoint of a chain in priority
//! order until one attempt succeeds:
//!
//! ```text
//! Connecting -> Discovering -> Reading -> RateLookup -> Computed
//! ```
//!
//! Each attempt starts from scratch. Its outcome is classified with
//! [`MetricsError::failure_kind`]: transient and logical failures move on
//! to the next endpoint, fatal ones end the computation.

use alloy_primitives::Address;
use chrono::Utc;
use eyre::Result;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::chains::{ChainConfig, ChainEndpoint, ChainTable, QuoteKind};
use crate::config::Settings;
use crate::error::{FailureKind, MetricsError};
use crate::fiat::{FiatRateClient, FiatRateSource};
use crate::metrics::{MetricsResult, Provenance, Readings};
use crate::reader::{
    find_pool, read_exclusions, read_pool_state, ChainConnector, RpcConnector, TokenInfo,
};

// ============================================
// REQUEST / OUTCOME
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRequest {
    pub token: Address,
    pub chain_id: u64,
    /// Sole endpoint when set; otherwise the chain's RPC list
    pub rpc_url: Option<String>,
    pub exclude: Vec<Address>,
}

/// Pipeline position of an attempt, reported with its failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connecting,
    Discovering,
    Reading,
    RateLookup,
    Computed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Connecting => write!(f, "connecting"),
            Stage::Discovering => write!(f, "discovering"),
            Stage::Reading => write!(f, "reading"),
            Stage::RateLookup => write!(f, "rate lookup"),
            Stage::Computed => write!(f, "computed"),
        }
    }
}

#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Box<MetricsResult>),
    TransientFailure { stage: Stage, error: MetricsError },
    LogicalFailure { stage: Stage, error: MetricsError },
    FatalFailure { stage: Stage, error: MetricsError },
}

impl AttemptOutcome {
    fn failed(stage: Stage, error: MetricsError) -> Self {
        match error.failure_kind() {
            FailureKind::Transient => AttemptOutcome::TransientFailure { stage, error },
            FailureKind::Logical => AttemptOutcome::LogicalFailure { stage, error },
            FailureKind::Fatal => AttemptOutcome::FatalFailure { stage, error },
        }
    }
}

// ============================================
// AGGREGATOR
// ============================================

pub struct MetricsAggregator {
    chains: ChainTable,
    connector: Arc<dyn ChainConnector>,
    fiat: Arc<dyn FiatRateSource>,
}

impl MetricsAggregator {
    pub fn new(chains: ChainTable, connector: Arc<dyn ChainConnector>, fiat: Arc<dyn FiatRateSource>) -> Self {
        Self {
            chains,
            connector,
            fiat,
        }
    }

    /// Live JSON-RPC connector and public fiat APIs
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let chains = settings.chain_table()?;
        let connector = RpcConnector::new(Duration::from_secs(settings.rpc_timeout_secs));
        let fiat = FiatRateClient::new(Duration::from_secs(settings.fiat_timeout_secs))?;

        Ok(Self::new(chains, Arc::new(connector), Arc::new(fiat)))
    }

    pub fn chains(&self) -> &ChainTable {
        &self.chains
    }

    pub async fn compute(&self, request: &MetricsRequest) -> Result<MetricsResult, MetricsError> {
        let chain = self.chains.get(request.chain_id)?;
        let endpoints = chain.endpoints(request.rpc_url.as_deref());
        if endpoints.is_empty() {
            return Err(MetricsError::NoEndpoints(request.chain_id));
        }

        let attempts = endpoints.len();
        let mut last_error = None;

        for (i, endpoint) in endpoints.iter().enumerate() {
            info!("Attempt {}/{} via {}", i + 1, attempts, endpoint.url);

            match self.run_attempt(chain, endpoint, request).await {
                AttemptOutcome::Success(result) => {
                    info!(
                        "Metrics for {} computed via {} at block {}",
                        request.token, endpoint.url, result.provenance.block_number
                    );
                    return Ok(*result);
                }
                AttemptOutcome::TransientFailure { stage, error } => {
                    warn!("{} failed while {}: {}", endpoint.url, stage, error);
                    last_error = Some(error);
                }
                AttemptOutcome::LogicalFailure { stage, error } => {
                    warn!("{} answered but {} failed: {}", endpoint.url, stage, error);
                    last_error = Some(error);
                }
                AttemptOutcome::FatalFailure { stage, error } => {
                    error!("Giving up while {}: {}", stage, error);
                    return Err(error);
                }
            }
        }

        Err(MetricsError::AllEndpointsFailed {
            attempts,
            last: Box::new(last_error.unwrap_or(MetricsError::NoEndpoints(request.chain_id))),
        })
    }

    async fn run_attempt(
        &self,
        chain: &ChainConfig,
        endpoint: &ChainEndpoint,
        request: &MetricsRequest,
    ) -> AttemptOutcome {
        let mut stage = Stage::Connecting;
        match self.attempt(chain, endpoint, request, &mut stage).await {
            Ok(result) => AttemptOutcome::Success(Box::new(result)),
            Err(error) => AttemptOutcome::failed(stage, error),
        }
    }

    async fn attempt(
        &self,
        chain: &ChainConfig,
        endpoint: &ChainEndpoint,
        request: &MetricsRequest,
        stage: &mut Stage,
    ) -> Result<MetricsResult, MetricsError> {
        let client = self.connector.connect(endpoint)?;
        let client = client.as_ref();

        let (block_number, chain_id) = tokio::try_join!(client.block_number(), client.chain_id())?;
        if chain_id != endpoint.chain_id {
            return Err(MetricsError::ChainMismatch {
                expected: endpoint.chain_id,
                actual: chain_id,
            });
        }
        debug!("{} is at block {}", endpoint.url, block_number);

        *stage = Stage::Discovering;
        let pool = find_pool(client, chain, request.token).await?;

        *stage = Stage::Reading;
        let (state, total_supply_raw) = tokio::try_join!(
            read_pool_state(client, request.token, &pool),
            client.total_supply(request.token),
        )?;
        let exclusions = read_exclusions(client, request.token, &request.exclude).await;

        *stage = Stage::RateLookup;
        let fiat = match pool.quote_kind {
            QuoteKind::WrappedNative => self.fiat.eth_eur().await,
            QuoteKind::Stablecoin => None,
        };

        *stage = Stage::Computed;
        let token = TokenInfo {
            meta: state.base.meta.clone(),
            total_supply_raw,
        };

        Ok(MetricsResult::derive(Readings {
            chain_id: chain.chain_id,
            token,
            pool,
            state,
            exclusions,
            excluded_addresses: request.exclude.clone(),
            fiat,
            provenance: Provenance {
                rpc_url: client.endpoint().to_string(),
                block_number,
                timestamp: Utc::now(),
            },
        }))
    }
}
