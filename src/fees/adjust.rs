//! Fee markup applied to the primary fee component

use super::quote::FeeQuote;
use crate::error::{FeeError, FeeResult};

use ethers::types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Convert a markup factor into a whole percentage (`1.05` -> `105`).
///
/// Midpoints round away from zero.
pub fn markup_percent(factor: Decimal) -> FeeResult<u64> {
    if factor < Decimal::ZERO {
        return Err(FeeError::config(format!(
            "fee markup factor must not be negative, got {}",
            factor
        )));
    }

    factor
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|percent| percent.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|percent| percent.to_u64())
        .ok_or_else(|| FeeError::config(format!("fee markup factor {} is too large", factor)))
}

/// Multiply the primary fee of `quote` by `factor` in integer arithmetic
pub fn apply_markup(quote: FeeQuote, factor: Decimal) -> FeeResult<FeeQuote> {
    let percent = U256::from(markup_percent(factor)?);

    // multiply before dividing so small fees keep their precision
    let adjusted = quote
        .primary()
        .checked_mul(percent)
        .ok_or_else(|| FeeError::config(format!("fee markup factor {} overflows the fee", factor)))?
        / U256::from(100);

    Ok(quote.with_primary(adjusted))
}

/// Marks quotes up by a session-wide default factor
#[derive(Debug, Clone, Copy)]
pub struct FeeAdjuster {
    default_factor: Decimal,
}

impl FeeAdjuster {
    pub fn new(default_factor: Decimal) -> FeeResult<Self> {
        markup_percent(default_factor)?;
        Ok(Self { default_factor })
    }

    pub fn default_factor(&self) -> Decimal {
        self.default_factor
    }

    /// Adjust with `factor`, or the default factor when none is given
    pub fn adjust(&self, quote: FeeQuote, factor: Option<Decimal>) -> FeeResult<FeeQuote> {
        apply_markup(quote, factor.unwrap_or(self.default_factor))
    }
}

impl Default for FeeAdjuster {
    fn default() -> Self {
        Self {
            default_factor: Decimal::ONE,
        }
    }
}
