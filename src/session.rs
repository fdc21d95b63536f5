//! Session bootstrap and session-scoped state
//!
//! A [`Session`] is created once per run against one node. Bootstrap samples
//! the block time, reads the chain id, selects the fee model, waits at the
//! gas price gate and stores the marked-up bid. Everything it learns lives
//! in [`SessionState`]; nothing is process-global, so sessions against
//! different nodes can coexist.

use crate::chain::{find_latest_transaction, ChainClock, NodeClient, TxSummary};
use crate::config::FeeOptions;
use crate::error::{FeeError, FeeResult};
use crate::fees::{
    format_gwei, FeeAdjuster, FeeModel, FeeModelSelector, FeeQuote, FeeQuoteFetcher,
    GasPriceGate, GateOutcome,
};
use crate::verbosity::{report, Verbosity};

use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// What bootstrap learned about the chain, plus the latest bid
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    chain_id: u64,
    network: String,
    fee_model: FeeModel,
    block_time: Duration,
    fee_markup: Decimal,
    last_fee_quote: Option<FeeQuote>,
}

impl SessionState {
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn fee_model(&self) -> FeeModel {
        self.fee_model
    }

    pub fn block_time(&self) -> Duration {
        self.block_time
    }

    pub fn fee_markup(&self) -> Decimal {
        self.fee_markup
    }

    /// Most recent adjusted quote produced in this session
    pub fn last_fee_quote(&self) -> Option<FeeQuote> {
        self.last_fee_quote
    }
}

/// Fail when the node serves a different chain than configured
fn ensure_chain_id(network: &str, expected: Option<u64>, actual: u64) -> FeeResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(FeeError::config(format!(
            "Network {} expects chain id {} but the node reports {}",
            network, expected, actual
        ))),
        _ => Ok(()),
    }
}

/// A bootstrapped fee session against one node
pub struct Session<N: ?Sized> {
    state: SessionState,
    node: Arc<N>,
    clock: ChainClock<N>,
    adjuster: FeeAdjuster,
    threshold: U256,
    gate_timeout: Option<Duration>,
}

impl<N: NodeClient + ?Sized> Session<N> {
    /// Bootstrap a session and resolve the first adjusted fee bid.
    ///
    /// Fails with [`FeeError::Timeout`] when the gate deadline passes before
    /// the price becomes acceptable.
    pub async fn bootstrap(
        node: Arc<N>,
        network: &str,
        options: &FeeOptions,
        verbosity: Verbosity,
    ) -> FeeResult<Self> {
        Self::bootstrap_with_chain_id(node, network, None, options, verbosity).await
    }

    /// Like [`Session::bootstrap`], but refuse a node whose chain id differs
    /// from `expected_chain_id` before any fee is queried
    pub async fn bootstrap_with_chain_id(
        node: Arc<N>,
        network: &str,
        expected_chain_id: Option<u64>,
        options: &FeeOptions,
        verbosity: Verbosity,
    ) -> FeeResult<Self> {
        let adjuster = FeeAdjuster::new(options.markup)?;

        let clock = ChainClock::calibrate(node.clone()).await?;
        info!("Block time: {:?}", clock.block_time());

        let chain_id = node.chain_id().await?;
        info!("Chain ID: {}", chain_id);
        ensure_chain_id(network, expected_chain_id, chain_id)?;
        info!("Network: {}", network);

        let decision = FeeModelSelector::new(options.forced_model)
            .select(node.as_ref())
            .await?;
        info!(
            "Tx type: {} ({})",
            decision.model.tx_type(),
            decision.model
        );

        let mut session = Self {
            state: SessionState {
                chain_id,
                network: network.to_string(),
                fee_model: decision.model,
                block_time: clock.block_time(),
                fee_markup: adjuster.default_factor(),
                last_fee_quote: None,
            },
            node,
            clock,
            adjuster,
            threshold: options.threshold,
            gate_timeout: options.gate_timeout,
        };

        let quote = match session.await_gas_price(verbosity).await? {
            GateOutcome::Satisfied {
                quote: Some(quote), ..
            } => quote,
            GateOutcome::Satisfied { quote: None, .. } => session.fetcher().fetch().await?,
            GateOutcome::TimedOut { .. } => {
                return Err(FeeError::Timeout {
                    operation: "gas price gate".to_string(),
                })
            }
        };

        report!(
            verbosity.primary(),
            "Proceeding with gas price: {} gwei",
            format_gwei(quote.primary())
        );

        let adjusted = session.adjust_and_report(quote, None, verbosity)?;
        session.state.last_fee_quote = Some(adjusted);

        Ok(session)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn node(&self) -> &Arc<N> {
        &self.node
    }

    pub fn clock(&self) -> &ChainClock<N> {
        &self.clock
    }

    /// Quote fetcher bound to the session fee model
    pub fn fetcher(&self) -> FeeQuoteFetcher<N> {
        FeeQuoteFetcher::new(self.node.clone(), self.state.fee_model)
    }

    /// Gas price gate with the session threshold and deadline
    pub fn gate(&self) -> GasPriceGate<N> {
        GasPriceGate::new(self.fetcher(), self.clock.clone(), self.threshold)
            .with_timeout(self.gate_timeout)
    }

    pub async fn await_gas_price(&self, verbosity: Verbosity) -> FeeResult<GateOutcome> {
        self.gate().run(verbosity).await
    }

    /// Apply the session markup, or `factor` when given
    pub fn adjust(&self, quote: FeeQuote, factor: Option<Decimal>) -> FeeResult<FeeQuote> {
        self.adjuster.adjust(quote, factor)
    }

    /// Fetch a fresh quote, mark it up and remember it as the latest bid.
    ///
    /// Secondary output is the markup factor line; primary output is the
    /// resulting price.
    pub async fn fee_quote(
        &mut self,
        factor: Option<Decimal>,
        verbosity: Verbosity,
    ) -> FeeResult<FeeQuote> {
        let quote = self.fetcher().fetch().await?;
        let adjusted = self.adjust_and_report(quote, factor, verbosity)?;
        self.state.last_fee_quote = Some(adjusted);
        Ok(adjusted)
    }

    pub fn last_fee_quote(&self) -> Option<FeeQuote> {
        self.state.last_fee_quote
    }

    /// Wait until the chain is `blocks` blocks past its current height
    pub async fn wait_blocks(&self, blocks: u64) -> FeeResult<u64> {
        self.clock.wait_for_blocks(blocks).await
    }

    pub async fn find_latest_transaction(
        &self,
        from: Address,
        to: Address,
        blocks_to_scan: u64,
    ) -> FeeResult<Option<TxSummary>> {
        find_latest_transaction(self.node.as_ref(), from, to, blocks_to_scan).await
    }

    fn adjust_and_report(
        &self,
        quote: FeeQuote,
        factor: Option<Decimal>,
        verbosity: Verbosity,
    ) -> FeeResult<FeeQuote> {
        let factor = factor.unwrap_or(self.adjuster.default_factor());
        report!(
            verbosity.secondary(),
            "Gas price increment factor: {}x",
            factor
        );

        let adjusted = self.adjust(quote, Some(factor))?;
        report!(
            verbosity.primary(),
            "Gas price: {} gwei",
            format_gwei(adjusted.primary())
        );
        Ok(adjusted)
    }
}
