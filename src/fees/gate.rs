//! Gas price gate - defers submission until the node quotes an acceptable price
//!
//! ```text
//!            threshold == 0
//!   entry ───────────────────────────────▶ SATISFIED
//!     │                                       ▲
//!     ▼          price <= threshold           │
//!   POLLING ──────────────────────────────────┘
//!     │  ▲
//!     └──┘ price > threshold: wait one block
//!     │
//!     └──── deadline passed while waiting ───▶ TIMED_OUT
//! ```
//!
//! Without a deadline the gate polls until the price drops or the process
//! is stopped.

use super::quote::{FeeQuote, FeeQuoteFetcher};
use super::format_gwei;
use crate::chain::{ChainClock, NodeClient};
use crate::error::{FeeError, FeeResult};
use crate::verbosity::{report, Verbosity};

use ethers::types::U256;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// How a gate invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Price at or below threshold; `quote` is `None` when the check was skipped
    Satisfied { quote: Option<FeeQuote>, polls: u32 },
    /// Deadline passed before the price dropped
    TimedOut {
        last_quote: Option<FeeQuote>,
        polls: u32,
    },
}

impl GateOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, GateOutcome::Satisfied { .. })
    }

    /// Number of quotes fetched
    pub fn polls(&self) -> u32 {
        match self {
            GateOutcome::Satisfied { polls, .. } | GateOutcome::TimedOut { polls, .. } => *polls,
        }
    }

    /// Last quote observed by the gate
    pub fn quote(&self) -> Option<FeeQuote> {
        match self {
            GateOutcome::Satisfied { quote, .. } => *quote,
            GateOutcome::TimedOut { last_quote, .. } => *last_quote,
        }
    }
}

/// Transient state of one gate invocation
struct PollState {
    threshold: U256,
    current_price: Option<U256>,
    target_block: Option<u64>,
    last_quote: Option<FeeQuote>,
    polls: u32,
}

impl PollState {
    fn new(threshold: U256) -> Self {
        Self {
            threshold,
            current_price: None,
            target_block: None,
            last_quote: None,
            polls: 0,
        }
    }

    /// Record a quote; true when it satisfies the threshold
    fn observe(&mut self, quote: FeeQuote) -> bool {
        let price = quote.primary();
        self.polls += 1;
        self.current_price = Some(price);
        self.last_quote = Some(quote);
        price <= self.threshold
    }

    fn satisfied(self) -> GateOutcome {
        GateOutcome::Satisfied {
            quote: self.last_quote,
            polls: self.polls,
        }
    }

    fn timed_out(self) -> GateOutcome {
        GateOutcome::TimedOut {
            last_quote: self.last_quote,
            polls: self.polls,
        }
    }
}

/// Blocks until the primary fee is at or below a threshold
pub struct GasPriceGate<N: ?Sized> {
    fetcher: FeeQuoteFetcher<N>,
    clock: ChainClock<N>,
    threshold: U256,
    timeout: Option<Duration>,
}

impl<N: NodeClient + ?Sized> GasPriceGate<N> {
    /// A zero `threshold` disables the check
    pub fn new(fetcher: FeeQuoteFetcher<N>, clock: ChainClock<N>, threshold: U256) -> Self {
        Self {
            fetcher,
            clock,
            threshold,
            timeout: None,
        }
    }

    /// Give up after `timeout` instead of polling indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn threshold(&self) -> U256 {
        self.threshold
    }

    /// Poll once per block until the price is acceptable or the deadline passes.
    ///
    /// Primary output is the threshold line; secondary output is the
    /// per-poll price line.
    pub async fn run(&self, verbosity: Verbosity) -> FeeResult<GateOutcome> {
        report!(
            verbosity.primary(),
            "Checking gas price with threshold: {} gwei",
            format_gwei(self.threshold)
        );

        if self.threshold.is_zero() {
            report!(verbosity.primary(), "Gas price check skipped");
            crate::metrics::record_gate_outcome("skipped");
            return Ok(GateOutcome::Satisfied {
                quote: None,
                polls: 0,
            });
        }

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut state = PollState::new(self.threshold);

        loop {
            let quote = self.fetcher.fetch().await?;
            let acceptable = state.observe(quote);

            crate::metrics::record_gate_poll(quote.primary());
            report!(
                verbosity.secondary(),
                "Gas price: {} gwei (poll {})",
                format_gwei(quote.primary()),
                state.polls
            );

            if acceptable {
                crate::metrics::record_gate_outcome("satisfied");
                return Ok(state.satisfied());
            }

            let next_block = async {
                let start = self.clock.current_block_number().await?;
                Ok::<_, FeeError>((start + 1, self.clock.wait_from(start, 1).await?))
            };

            let (target, reached) = match deadline {
                None => next_block.await?,
                Some(deadline) => match timeout_at(deadline, next_block).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!(
                            "Gas price gate timed out after {} poll(s) (last target block {:?}), last price {} gwei",
                            state.polls,
                            state.target_block,
                            state.current_price.map(format_gwei).unwrap_or_default()
                        );
                        crate::metrics::record_gate_outcome("timed_out");
                        return Ok(state.timed_out());
                    }
                },
            };
            state.target_block = Some(target);
            debug!("Reached block {} (target {})", reached, target);
        }
    }
}
