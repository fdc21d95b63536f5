//! Fee engine - model selection, quotes, threshold gating and markup
//!
//! The pieces run in a fixed order within a session:
//! 1. [`FeeModelSelector`] picks legacy or dynamic fees once
//! 2. [`FeeQuoteFetcher`] shapes every node quote to that model
//! 3. [`GasPriceGate`] waits, block by block, for an acceptable price
//! 4. [`FeeAdjuster`] marks the primary fee up into the submitted bid

pub mod adjust;
pub mod gate;
pub mod model;
pub mod quote;

pub use adjust::{apply_markup, markup_percent, FeeAdjuster};
pub use gate::{GasPriceGate, GateOutcome};
pub use model::{FeeModel, FeeModelDecision, FeeModelSelector};
pub use quote::{FeeQuote, FeeQuoteFetcher, RawFeeData, TxFeeOptions};

use ethers::types::U256;
use ethers::utils::format_units;

/// Render a wei amount as gwei for log lines
pub fn format_gwei(wei: U256) -> String {
    format_units(wei, "gwei").unwrap_or_else(|_| format!("{} wei", wei))
}

/// Lossy gwei value for gauges
pub(crate) fn gwei_f64(wei: U256) -> f64 {
    wei.low_u128() as f64 / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_gwei() {
        assert_eq!(format_gwei(U256::from(12_500_000_000u64)), "12.500000000");
        assert_eq!(format_gwei(U256::zero()), "0.000000000");
    }

    #[test]
    fn test_gwei_f64() {
        assert_eq!(gwei_f64(U256::from(3_000_000_000u64)), 3.0);
    }
}
