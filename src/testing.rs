//! Shared fixtures for unit tests

use crate::chain::MockNodeClient;
use crate::fees::RawFeeData;

use ethers::types::U256;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(9)
}

/// Node answer of a chain without EIP-1559
pub fn legacy_fee_data(gas_price_gwei: u64) -> RawFeeData {
    RawFeeData {
        gas_price: Some(gwei(gas_price_gwei)),
        max_fee_per_gas: None,
        max_priority_fee_per_gas: None,
    }
}

/// Node answer of an EIP-1559 chain: `maxFeePerGas = 2 * base + priority`
pub fn dynamic_fee_data(base_fee_gwei: u64, priority_fee_gwei: u64) -> RawFeeData {
    RawFeeData {
        gas_price: Some(gwei(base_fee_gwei)),
        max_fee_per_gas: Some(gwei(2 * base_fee_gwei + priority_fee_gwei)),
        max_priority_fee_per_gas: Some(gwei(priority_fee_gwei)),
    }
}

/// Serve `answers` in order, repeating the last one; returns the call counter
pub fn scripted_fee_data(node: &mut MockNodeClient, answers: Vec<RawFeeData>) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    node.expect_fee_data().returning(move || {
        let index = counter.fetch_add(1, Ordering::SeqCst);
        Ok(answers[index.min(answers.len() - 1)])
    });
    calls
}

/// Block number grows by one on every query
pub fn advancing_block_numbers(node: &mut MockNodeClient, start: u64) -> Arc<AtomicU64> {
    stepped_block_numbers(node, start, 1)
}

/// Block number grows by one every `step` queries
pub fn stepped_block_numbers(node: &mut MockNodeClient, start: u64, step: u64) -> Arc<AtomicU64> {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    node.expect_block_number().returning(move || {
        let index = counter.fetch_add(1, Ordering::SeqCst);
        Ok(start + index / step)
    });
    calls
}

/// Block number grows with (tokio) wall-clock time, one block per `interval`
pub fn timed_block_numbers(
    node: &mut MockNodeClient,
    start: u64,
    interval: Duration,
) -> Arc<AtomicU64> {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let origin = Instant::now();
    node.expect_block_number().returning(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let elapsed = origin.elapsed().as_millis() as u64;
        Ok(start + elapsed / interval.as_millis() as u64)
    });
    calls
}
