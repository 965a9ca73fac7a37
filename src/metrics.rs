//! Metric derivation and the serialized result
//!
//! Price is the ratio of the two balances held at the pool address, an
//! approximation of the spot price, not tick math. Circulating supply is
//! exact (raw integers, saturating); everything expressed as `f64` is for
//! display.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::chains::QuoteKind;
use crate::fiat::FiatRate;
use crate::reader::{ExclusionReadout, PoolReference, PoolState, TokenInfo};

// ============================================
// ARITHMETIC
// ============================================

/// Scale a raw fixed-point amount by `decimals`
pub fn to_units(raw: U256, decimals: u8) -> f64 {
    let Some(scale) = U256::from(10u8).checked_pow(U256::from(decimals)) else {
        // Beyond 10^77 the scale no longer fits in 256 bits
        return parse_f64(raw) / 10f64.powi(i32::from(decimals));
    };

    let (whole, frac) = raw.div_rem(scale);
    parse_f64(whole) + parse_f64(frac) / parse_f64(scale)
}

fn parse_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(f64::INFINITY)
}

/// Quote per base token; zero for an empty pool
pub fn price_in_quote(base_in_pool: f64, quote_in_pool: f64) -> f64 {
    if base_in_pool > 0.0 {
        quote_in_pool / base_in_pool
    } else {
        0.0
    }
}

/// `max(total - pool - excluded, 0)` on raw integers
pub fn circulating_raw(total: U256, in_pool: U256, excluded: U256) -> U256 {
    total.saturating_sub(in_pool).saturating_sub(excluded)
}

fn as_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

// ============================================
// RESULT
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSection {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    #[serde(serialize_with = "as_decimal")]
    pub total_supply_raw: U256,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSection {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub kind: QuoteKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSection {
    pub address: Address,
    pub fee: u32,
    pub quote: QuoteSection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolBalances {
    #[serde(serialize_with = "as_decimal")]
    pub token_in_pool_raw: U256,
    #[serde(serialize_with = "as_decimal")]
    pub quote_in_pool_raw: U256,
    pub token_in_pool: f64,
    pub quote_in_pool: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSection {
    pub in_quote: f64,
    pub quote_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplySection {
    pub total: f64,
    #[serde(serialize_with = "as_decimal")]
    pub total_raw: U256,
    pub circulating: f64,
    #[serde(serialize_with = "as_decimal")]
    pub circulating_raw: U256,
    pub excluded_addresses: Vec<Address>,
    pub excluded_amount: f64,
    #[serde(serialize_with = "as_decimal")]
    pub excluded_amount_raw: U256,
    pub unreadable_exclusions: Vec<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketCap {
    pub circulating: f64,
    pub fdv: f64,
}

impl MarketCap {
    fn scaled(&self, factor: f64) -> Self {
        Self {
            circulating: self.circulating * factor,
            fdv: self.fdv * factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub rpc_url: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// One full computation. The fiat keys are omitted, not zeroed, when no
/// rate applies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResult {
    pub chain_id: u64,
    pub token: TokenSection,
    pub pool: PoolSection,
    pub balances: PoolBalances,
    pub price: PriceSection,
    pub supply: SupplySection,
    pub market_cap: MarketCap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fx: Option<FiatRate>,
    #[serde(rename = "priceEUR", skip_serializing_if = "Option::is_none")]
    pub price_eur: Option<f64>,
    #[serde(rename = "marketCapEUR", skip_serializing_if = "Option::is_none")]
    pub market_cap_eur: Option<MarketCap>,
    pub notes: Vec<String>,
    pub provenance: Provenance,
}

/// Everything one successful attempt read from the chain
#[derive(Debug, Clone)]
pub struct Readings {
    pub chain_id: u64,
    pub token: TokenInfo,
    pub pool: PoolReference,
    pub state: PoolState,
    pub exclusions: ExclusionReadout,
    pub excluded_addresses: Vec<Address>,
    pub fiat: Option<FiatRate>,
    pub provenance: Provenance,
}

impl MetricsResult {
    pub fn derive(readings: Readings) -> Self {
        let Readings {
            chain_id,
            token,
            pool,
            state,
            exclusions,
            excluded_addresses,
            fiat,
            provenance,
        } = readings;

        let decimals = token.meta.decimals;
        let base_raw = state.base.balance.raw;
        let quote_raw = state.quote.balance.raw;

        let token_in_pool = to_units(base_raw, decimals);
        let quote_in_pool = state.quote.balance.amount();
        let price = price_in_quote(token_in_pool, quote_in_pool);

        let circ_raw = circulating_raw(token.total_supply_raw, base_raw, exclusions.total_raw);
        let total = to_units(token.total_supply_raw, decimals);
        let circulating = to_units(circ_raw, decimals);

        let market_cap = MarketCap {
            circulating: circulating * price,
            fdv: total * price,
        };

        let mut notes = vec![format!(
            "Price is the {}/{} balance ratio at the pool address, an approximation of spot price",
            state.quote.meta.symbol, token.meta.symbol
        )];
        if base_raw.is_zero() {
            notes.push("Pool holds no base token; price reported as 0".to_string());
        }
        if !exclusions.unreadable.is_empty() {
            notes.push(format!(
                "{} excluded address balance(s) unreadable and counted as zero",
                exclusions.unreadable.len()
            ));
        }

        let fx = match (pool.quote_kind, fiat) {
            (QuoteKind::WrappedNative, Some(rate)) => Some(rate),
            (QuoteKind::WrappedNative, None) => {
                notes.push("ETH/EUR rate unavailable; EUR figures omitted".to_string());
                None
            }
            (QuoteKind::Stablecoin, _) => None,
        };

        Self {
            chain_id,
            token: TokenSection {
                address: token.meta.address,
                symbol: token.meta.symbol,
                decimals,
                total_supply_raw: token.total_supply_raw,
            },
            pool: PoolSection {
                address: pool.address,
                fee: pool.fee,
                quote: QuoteSection {
                    address: state.quote.meta.address,
                    symbol: state.quote.meta.symbol.clone(),
                    decimals: state.quote.meta.decimals,
                    kind: pool.quote_kind,
                },
            },
            balances: PoolBalances {
                token_in_pool_raw: base_raw,
                quote_in_pool_raw: quote_raw,
                token_in_pool,
                quote_in_pool,
            },
            price: PriceSection {
                in_quote: price,
                quote_symbol: state.quote.meta.symbol,
            },
            supply: SupplySection {
                total,
                total_raw: token.total_supply_raw,
                circulating,
                circulating_raw: circ_raw,
                excluded_addresses,
                excluded_amount: to_units(exclusions.total_raw, decimals),
                excluded_amount_raw: exclusions.total_raw,
                unreadable_exclusions: exclusions.unreadable,
            },
            market_cap,
            price_eur: fx.map(|rate| price * rate.eth_eur),
            market_cap_eur: fx.map(|rate| market_cap.scaled(rate.eth_eur)),
            fx,
            notes,
            provenance,
        }
    }
}
