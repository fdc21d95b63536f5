//! Recent-block transaction lookup

use super::{NodeClient, TxSummary};
use crate::error::FeeResult;

use ethers::types::Address;
use tracing::debug;

/// Default number of blocks searched back from the chain head
pub const DEFAULT_BLOCKS_TO_SCAN: u64 = 100;

/// Find the most recent transaction sent from `from` to `to` within the last
/// `blocks_to_scan` blocks, newest block first.
///
/// When one block holds several matches, the last one in block order is
/// returned, not the first.
pub async fn find_latest_transaction<N: NodeClient + ?Sized>(
    node: &N,
    from: Address,
    to: Address,
    blocks_to_scan: u64,
) -> FeeResult<Option<TxSummary>> {
    let head = node.block_number().await?;

    for offset in 0..blocks_to_scan {
        let Some(number) = head.checked_sub(offset) else {
            break;
        };

        let transactions = node.block_transactions(number).await?;
        if let Some(tx) = transactions
            .into_iter()
            .rev()
            .find(|tx| tx.from == from && tx.to == Some(to))
        {
            debug!("Found transaction {:?} in block {}", tx.hash, number);
            return Ok(Some(tx));
        }
    }

    debug!(
        "No transaction from {:?} to {:?} in the last {} blocks",
        from, to, blocks_to_scan
    );
    Ok(None)
}
