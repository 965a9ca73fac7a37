//! Error taxonomy for the metrics pipeline
//!
//! Every failure inside one endpoint attempt is a `MetricsError`. The
//! aggregator classifies each one with [`MetricsError::failure_kind`] to
//! decide between failing over to the next endpoint and giving up.

use alloy_primitives::Address;
use std::time::Duration;
use thiserror::Error;

/// How the aggregator reacts to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport trouble on this endpoint (timeouts, bad responses, lagging node)
    Transient,
    /// The endpoint answered but the data says "no" (e.g. no pool);
    /// still fails over
    Logical,
    /// Configuration problem that no other endpoint can fix
    Fatal,
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("unsupported chain id {0}: no factory / quote tokens / fee tiers configured")]
    UnsupportedChain(u64),

    #[error("no RPC endpoints configured for chain id {0}")]
    NoEndpoints(u64),

    #[error("invalid RPC endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("no Uniswap V3 pool found for {token} on chain {chain_id} (checked all quote tokens and fee tiers)")]
    NoPoolFound { token: Address, chain_id: u64 },

    #[error("endpoint serves chain id {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("{call} failed: {message}")]
    Rpc { call: String, message: String },

    #[error("{call} timed out after {after:?}")]
    Timeout { call: String, after: Duration },

    #[error("failed to decode {call} result: {message}")]
    Decode { call: String, message: String },

    #[error("all {attempts} RPC endpoints failed; last error: {last}")]
    AllEndpointsFailed { attempts: usize, last: Box<MetricsError> },
}

impl MetricsError {
    pub fn rpc(call: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MetricsError::Rpc {
            call: call.into(),
            message: err.to_string(),
        }
    }

    pub fn decode(call: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MetricsError::Decode {
            call: call.into(),
            message: err.to_string(),
        }
    }

    /// Failover decision table
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            MetricsError::UnsupportedChain(_)
            | MetricsError::NoEndpoints(_)
            | MetricsError::AllEndpointsFailed { .. } => FailureKind::Fatal,
            MetricsError::NoPoolFound { .. } => FailureKind::Logical,
            MetricsError::InvalidEndpoint { .. }
            | MetricsError::ChainMismatch { .. }
            | MetricsError::Rpc { .. }
            | MetricsError::Timeout { .. }
            | MetricsError::Decode { .. } => FailureKind::Transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        assert_eq!(MetricsError::UnsupportedChain(5).failure_kind(), FailureKind::Fatal);
        assert_eq!(
            MetricsError::NoPoolFound { token: Address::ZERO, chain_id: 8453 }.failure_kind(),
            FailureKind::Logical
        );
        assert_eq!(
            MetricsError::rpc("eth_blockNumber", "connection refused").failure_kind(),
            FailureKind::Transient
        );
        assert_eq!(
            MetricsError::Timeout { call: "balanceOf".into(), after: Duration::from_secs(1) }
                .failure_kind(),
            FailureKind::Transient
        );
    }

    #[test]
    fn test_all_endpoints_failed_keeps_last_message() {
        let err = MetricsError::AllEndpointsFailed {
            attempts: 3,
            last: Box::new(MetricsError::rpc("eth_blockNumber", "502 Bad Gateway")),
        };
        let msg = err.to_string();
        assert!(msg.contains("all 3 RPC endpoints failed"));
        assert_eq!(msg.matches("502 Bad Gateway").count(), 1);

        // the last error is in the message only, so reports print it once
        assert!(std::error::Error::source(&err).is_none());
        let report = format!("{:?}", eyre::Report::new(err));
        assert_eq!(report.matches("502 Bad Gateway").count(), 1);
    }
}
