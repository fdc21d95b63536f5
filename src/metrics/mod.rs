//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Observed gas prices and gate outcomes
//! - Chain height and sampled block time
//! - The selected fee model
//!
//! A run is short-lived, so instead of serving `/metrics` the binary can
//! write the text exposition to a file for a textfile collector.

use crate::error::FeeResult;
use crate::fees::{gwei_f64, FeeModel};

use ethers::types::U256;
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, register_int_counter_vec, Encoder,
    Gauge, GaugeVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

lazy_static! {
    // Fee metrics
    pub static ref GAS_PRICE_GWEI: Gauge = register_gauge!(
        "feegate_gas_price_gwei",
        "Primary fee of the last quote observed by the gas price gate"
    ).unwrap();

    pub static ref FEE_MODEL: GaugeVec = register_gauge_vec!(
        "feegate_fee_model",
        "Selected fee model (1=selected, 0=not selected)",
        &["model"]
    ).unwrap();

    // Gate metrics
    pub static ref GATE_POLLS: IntCounter = register_int_counter!(
        "feegate_gate_polls_total",
        "Total fee quotes fetched by the gas price gate"
    ).unwrap();

    pub static ref GATE_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "feegate_gate_outcomes_total",
        "Gas price gate outcomes",
        &["outcome"]
    ).unwrap();

    // Chain metrics
    pub static ref BLOCK_HEIGHT: Gauge = register_gauge!(
        "feegate_block_height",
        "Last observed block number"
    ).unwrap();

    pub static ref BLOCK_TIME_SECONDS: Gauge = register_gauge!(
        "feegate_block_time_seconds",
        "Sampled block time"
    ).unwrap();
}

/// Render all registered metrics in the text exposition format
pub fn render() -> FeeResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write the text exposition to `path`
pub fn write_textfile(path: &Path) -> FeeResult<()> {
    std::fs::write(path, render()?)?;
    info!("Metrics written to {}", path.display());
    Ok(())
}

// Helper functions to record metrics

pub fn record_gate_poll(price: U256) {
    GATE_POLLS.inc();
    GAS_PRICE_GWEI.set(gwei_f64(price));
}

pub fn record_gate_outcome(outcome: &str) {
    GATE_OUTCOMES.with_label_values(&[outcome]).inc();
}

pub fn record_fee_model(model: FeeModel) {
    for candidate in [FeeModel::Legacy, FeeModel::Dynamic] {
        FEE_MODEL
            .with_label_values(&[&candidate.to_string()])
            .set(if candidate == model { 1.0 } else { 0.0 });
    }
}

pub fn record_block_height(block_number: u64) {
    BLOCK_HEIGHT.set(block_number as f64);
}

pub fn record_block_time(block_time: Duration) {
    BLOCK_TIME_SECONDS.set(block_time.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_metrics() {
        record_gate_outcome("skipped");
        record_fee_model(FeeModel::Dynamic);
        record_block_time(Duration::from_secs(12));

        let text = render().unwrap();
        assert!(text.contains("feegate_gate_outcomes_total"));
        assert!(text.contains("feegate_fee_model{model=\"dynamic\"}"));
        assert!(text.contains("feegate_block_time_seconds"));
    }

    #[test]
    fn test_write_textfile() {
        record_block_height(42);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feegate.prom");
        write_textfile(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("feegate_block_height"));
    }
}
