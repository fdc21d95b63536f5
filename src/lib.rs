//! feegate - fee estimation and chain synchronisation for transaction submitters
//!
//! Bootstraps a [`Session`] against an EVM node: samples the block time,
//! picks legacy or EIP-1559 fees, waits until the node quotes a gas price
//! under a configured threshold and marks the quote up into a bid.

pub mod chain;
pub mod config;
pub mod error;
pub mod fees;
pub mod metrics;
pub mod session;
pub mod verbosity;

#[cfg(test)]
mod testing;

pub use chain::{ChainClock, ChainProvider, NodeClient};
pub use config::{FeeOptions, Settings};
pub use error::{FeeError, FeeResult};
pub use fees::{FeeModel, FeeQuote, GateOutcome};
pub use session::{Session, SessionState};
pub use verbosity::Verbosity;
