//! Chain module - node access and block-time synchronisation
//!
//! This module provides:
//! - The [`NodeClient`] trait every fee component talks through
//! - An `ethers` HTTP provider with multi-RPC failover
//! - Block-time estimation and block-count waits
//! - Recent-block transaction lookup

pub mod clock;
pub mod provider;
pub mod scan;

pub use clock::{ChainClock, CONFIRMATION_POLL_INTERVAL};
pub use provider::ChainProvider;
pub use scan::find_latest_transaction;

use crate::error::FeeResult;
use crate::fees::RawFeeData;

use async_trait::async_trait;
use ethers::types::{Address, H256};

#[cfg(test)]
use mockall::automock;

/// Transaction fields needed to match a sender/recipient pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSummary {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    pub block_number: u64,
}

/// Node RPC operations consumed by the engine.
///
/// Every failure is a transport failure from the engine's point of view and
/// surfaces as [`FeeError::NodeUnavailable`](crate::error::FeeError).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Chain id reported by the node (`eth_chainId`)
    async fn chain_id(&self) -> FeeResult<u64>;

    /// Latest block number (`eth_blockNumber`)
    async fn block_number(&self) -> FeeResult<u64>;

    /// Timestamp in seconds of the given block
    async fn block_timestamp(&self, number: u64) -> FeeResult<u64>;

    /// Unbiased fee recommendation with every field the node reports
    async fn fee_data(&self) -> FeeResult<RawFeeData>;

    /// Transactions included in the given block, in block order
    async fn block_transactions(&self, number: u64) -> FeeResult<Vec<TxSummary>>;
}
