//! Fee quotes and the fetcher that shapes them to the session model

use super::model::FeeModel;
use crate::chain::NodeClient;
use crate::error::{FeeError, FeeResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Eip1559TransactionRequest, TransactionRequest, U256};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Fee recommendation exactly as the node reported it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFeeData {
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl RawFeeData {
    pub fn supports_dynamic(&self) -> bool {
        self.max_fee_per_gas.is_some()
    }
}

/// Fee quote in the shape of one fee model, never both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeQuote {
    Legacy {
        gas_price: U256,
    },
    Dynamic {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl FeeQuote {
    /// Project a raw node answer onto `model`, keeping only that model's fields
    pub fn from_raw(raw: &RawFeeData, model: FeeModel) -> FeeResult<Self> {
        let missing = |field| FeeError::FeeDataUnavailable { model, field };

        match model {
            FeeModel::Legacy => Ok(FeeQuote::Legacy {
                gas_price: raw.gas_price.ok_or_else(|| missing(model.primary_field()))?,
            }),
            FeeModel::Dynamic => Ok(FeeQuote::Dynamic {
                max_fee_per_gas: raw.max_fee_per_gas.ok_or_else(|| missing(model.primary_field()))?,
                max_priority_fee_per_gas: raw
                    .max_priority_fee_per_gas
                    .ok_or_else(|| missing("maxPriorityFeePerGas"))?,
            }),
        }
    }

    pub fn model(&self) -> FeeModel {
        match self {
            FeeQuote::Legacy { .. } => FeeModel::Legacy,
            FeeQuote::Dynamic { .. } => FeeModel::Dynamic,
        }
    }

    /// The price compared against thresholds and marked up
    pub fn primary(&self) -> U256 {
        match self {
            FeeQuote::Legacy { gas_price } => *gas_price,
            FeeQuote::Dynamic {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }

    /// Same quote with the primary component replaced
    pub fn with_primary(self, value: U256) -> Self {
        match self {
            FeeQuote::Legacy { .. } => FeeQuote::Legacy { gas_price: value },
            FeeQuote::Dynamic {
                max_priority_fee_per_gas,
                ..
            } => FeeQuote::Dynamic {
                max_fee_per_gas: value,
                max_priority_fee_per_gas,
            },
        }
    }

    /// Upper bound of the cost in wei for `gas_limit` gas
    pub fn max_cost(&self, gas_limit: U256) -> U256 {
        gas_limit.saturating_mul(self.primary())
    }

    /// Fee fields of the transaction options handed to the submitter
    pub fn tx_options(&self) -> TxFeeOptions {
        match *self {
            FeeQuote::Legacy { gas_price } => TxFeeOptions {
                tx_type: 0,
                gas_price: Some(gas_price),
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
            },
            FeeQuote::Dynamic {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => TxFeeOptions {
                tx_type: 2,
                gas_price: None,
                max_fee_per_gas: Some(max_fee_per_gas),
                max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
            },
        }
    }

    /// Build a typed transaction carrying this quote's fees.
    ///
    /// Any gas price already set on `request` is dropped for dynamic quotes.
    pub fn to_typed_transaction(&self, request: TransactionRequest) -> TypedTransaction {
        match *self {
            FeeQuote::Legacy { gas_price } => TypedTransaction::Legacy(request.gas_price(gas_price)),
            FeeQuote::Dynamic {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut tx = Eip1559TransactionRequest::new()
                    .max_fee_per_gas(max_fee_per_gas)
                    .max_priority_fee_per_gas(max_priority_fee_per_gas);
                tx.from = request.from;
                tx.to = request.to;
                tx.gas = request.gas;
                tx.value = request.value;
                tx.data = request.data;
                tx.nonce = request.nonce;
                tx.chain_id = request.chain_id;
                TypedTransaction::Eip1559(tx)
            }
        }
    }
}

impl fmt::Display for FeeQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeQuote::Legacy { gas_price } => write!(f, "legacy: gas_price={} wei", gas_price),
            FeeQuote::Dynamic {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => write!(
                f,
                "dynamic: max_fee={} wei, priority_fee={} wei",
                max_fee_per_gas, max_priority_fee_per_gas
            ),
        }
    }
}

/// JSON transaction options produced for the submission collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxFeeOptions {
    #[serde(rename = "type")]
    pub tx_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
}

/// Fetches node quotes shaped to a fixed fee model
pub struct FeeQuoteFetcher<N: ?Sized> {
    node: Arc<N>,
    model: FeeModel,
}

impl<N: ?Sized> Clone for FeeQuoteFetcher<N> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            model: self.model,
        }
    }
}

impl<N: NodeClient + ?Sized> FeeQuoteFetcher<N> {
    pub fn new(node: Arc<N>, model: FeeModel) -> Self {
        Self { node, model }
    }

    pub fn model(&self) -> FeeModel {
        self.model
    }

    /// Current node quote, projected onto the session model
    pub async fn fetch(&self) -> FeeResult<FeeQuote> {
        let raw = self.node.fee_data().await?;
        FeeQuote::from_raw(&raw, self.model)
    }

    /// `gasPrice` for legacy sessions, `maxFeePerGas` for dynamic ones
    pub async fn fetch_primary_price(&self) -> FeeResult<U256> {
        Ok(self.fetch().await?.primary())
    }
}
