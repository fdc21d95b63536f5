//! Block-time estimation and block-count waits
//!
//! Waiting for `n` blocks happens in two phases: one coarse sleep of
//! `n * block_time` using the sampled block time, then a confirmation loop
//! that re-reads the block number every [`CONFIRMATION_POLL_INTERVAL`] until
//! the chain has actually advanced. The sample is a cadence hint only; the
//! confirmation loop decides when the wait is over.

use super::NodeClient;
use crate::error::FeeResult;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Re-poll interval of the confirmation phase
pub const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Observes block numbers and converts block counts into waits
pub struct ChainClock<N: ?Sized> {
    node: Arc<N>,
    block_time: Duration,
    poll_interval: Duration,
}

impl<N: ?Sized> Clone for ChainClock<N> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            block_time: self.block_time,
            poll_interval: self.poll_interval,
        }
    }
}

impl<N: NodeClient + ?Sized> ChainClock<N> {
    /// Create a clock with a known block time
    pub fn new(node: Arc<N>, block_time: Duration) -> Self {
        Self {
            node,
            block_time,
            poll_interval: CONFIRMATION_POLL_INTERVAL,
        }
    }

    /// Sample the block time from the node and create a clock with it
    pub async fn calibrate(node: Arc<N>) -> FeeResult<Self> {
        let block_time = Self::estimate_block_time(node.as_ref()).await?;
        Ok(Self::new(node, block_time))
    }

    /// Timestamp delta between the latest block and its predecessor.
    ///
    /// A single interval, not an average. Zero at genesis or when the
    /// timestamps are not increasing.
    pub async fn estimate_block_time(node: &N) -> FeeResult<Duration> {
        let latest = node.block_number().await?;
        if latest == 0 {
            return Ok(Duration::ZERO);
        }

        let (current, previous) = futures::try_join!(
            node.block_timestamp(latest),
            node.block_timestamp(latest - 1)
        )?;

        let block_time = Duration::from_secs(current.saturating_sub(previous));
        debug!("Sampled block time {:?} at block {}", block_time, latest);
        crate::metrics::record_block_time(block_time);

        Ok(block_time)
    }

    pub fn block_time(&self) -> Duration {
        self.block_time
    }

    /// Estimated wall-clock time for `blocks` blocks
    pub fn expected_wait(&self, blocks: u64) -> Duration {
        self.block_time
            .saturating_mul(u32::try_from(blocks).unwrap_or(u32::MAX))
    }

    pub async fn current_block_number(&self) -> FeeResult<u64> {
        let block = self.node.block_number().await?;
        crate::metrics::record_block_height(block);
        Ok(block)
    }

    /// Wait until the chain is `blocks` blocks past its current height.
    ///
    /// Returns the block number observed when the wait ended.
    pub async fn wait_for_blocks(&self, blocks: u64) -> FeeResult<u64> {
        let start = self.current_block_number().await?;
        self.wait_from(start, blocks).await
    }

    pub async fn wait_next_block(&self) -> FeeResult<u64> {
        self.wait_for_blocks(1).await
    }

    /// Wait until the chain reaches `start + blocks`, `start` being a height
    /// the caller already observed.
    pub async fn wait_from(&self, start: u64, blocks: u64) -> FeeResult<u64> {
        let target = start.saturating_add(blocks);
        let estimate = self.expected_wait(blocks);

        debug!(
            "Waiting {:?} for {} block(s), target block {}",
            estimate, blocks, target
        );
        sleep(estimate).await;

        loop {
            let current = self.current_block_number().await?;
            if current >= target {
                return Ok(current);
            }
            sleep(self.poll_interval).await;
        }
    }
}
