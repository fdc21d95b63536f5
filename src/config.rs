//! Configuration management for feegate
//!
//! Loads configuration from TOML files with environment variable substitution.
//! The fee inputs can also be overridden straight from the environment
//! (a `.env` file in the working directory is loaded first):
//!
//! | Variable                     | Overrides                         |
//! |------------------------------|-----------------------------------|
//! | `TX_TYPE_STATIC`             | `fees.tx_type`                    |
//! | `GAS_PRICE_THRESHOLD`        | `fees.gas_price_threshold`        |
//! | `GAS_PRICE_INCREMENT_FACTOR` | `fees.gas_price_increment_factor` |
//! | `FEEGATE_NETWORK`            | `default_network`                 |

use crate::error::{FeeError, FeeResult};
use crate::fees::FeeModel;
use crate::verbosity::Verbosity;

use anyhow::{Context, Result};
use ethers::types::U256;
use ethers::utils::parse_units;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_network")]
    pub default_network: String,
    #[serde(default)]
    pub fees: FeeSettings,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub networks: HashMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub rpc_urls: Vec<String>,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Expected chain id; checked against the node at bootstrap when set
    pub chain_id: Option<u64>,
}

impl NetworkConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

/// Raw fee inputs, kept as written until [`FeeSettings::resolve`]
#[derive(Debug, Clone, Deserialize)]
pub struct FeeSettings {
    /// Forced fee model: "0"/"legacy" or "2"/"dynamic"
    pub tx_type: Option<String>,
    /// Gwei; "0" disables the gas price gate
    #[serde(default = "default_threshold")]
    pub gas_price_threshold: String,
    #[serde(default = "default_increment_factor")]
    pub gas_price_increment_factor: String,
    /// Wait expression such as "10 minutes"; the gate polls forever when unset
    pub gate_timeout: Option<String>,
    #[serde(default)]
    pub verbosity: Verbosity,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            tx_type: None,
            gas_price_threshold: default_threshold(),
            gas_price_increment_factor: default_increment_factor(),
            gate_timeout: None,
            verbosity: Verbosity::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Write the Prometheus text exposition here after a run
    pub textfile: Option<PathBuf>,
}

/// Validated, typed fee inputs
#[derive(Debug, Clone, PartialEq)]
pub struct FeeOptions {
    pub forced_model: Option<FeeModel>,
    /// Wei; zero disables the gate
    pub threshold: U256,
    pub markup: Decimal,
    pub gate_timeout: Option<Duration>,
}

impl Default for FeeOptions {
    fn default() -> Self {
        Self {
            forced_model: None,
            threshold: U256::zero(),
            markup: Decimal::ONE,
            gate_timeout: None,
        }
    }
}

fn default_network() -> String {
    "production".to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

fn default_threshold() -> String {
    "0".to_string()
}

fn default_increment_factor() -> String {
    "1".to_string()
}

impl Settings {
    /// Load settings from `FEEGATE_CONFIG` or `config/default.toml`
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = env::var("FEEGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::from_file(&config_path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&config_str, |name| env::var(name).ok())
    }

    /// Parse a configuration document, resolving `${VAR}` references and
    /// overrides through `lookup`
    pub fn parse<F>(raw: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_str = substitute_env_vars(raw, &lookup);

        let mut settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.apply_overrides(&lookup);
        settings.validate()?;

        Ok(settings)
    }

    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup("TX_TYPE_STATIC") {
            self.fees.tx_type = Some(value);
        }
        if let Some(value) = lookup("GAS_PRICE_THRESHOLD") {
            self.fees.gas_price_threshold = value;
        }
        if let Some(value) = lookup("GAS_PRICE_INCREMENT_FACTOR") {
            self.fees.gas_price_increment_factor = value;
        }
        if let Some(value) = lookup("FEEGATE_NETWORK") {
            self.default_network = value;
        }
    }

    /// Validate configuration
    fn validate(&self) -> FeeResult<()> {
        // Only the active network needs its ${URL_*} variables set
        let (name, network) = self.active_network()?;
        if network.rpc_urls.iter().all(|url| url.trim().is_empty()) {
            return Err(FeeError::config(format!(
                "Network {} has no RPC URLs configured",
                name
            )));
        }

        self.fees.resolve()?;

        Ok(())
    }

    /// The network selected by `default_network`
    pub fn active_network(&self) -> FeeResult<(&str, &NetworkConfig)> {
        self.networks
            .get_key_value(&self.default_network)
            .map(|(name, network)| (name.as_str(), network))
            .ok_or_else(|| {
                FeeError::config(format!("Unknown network: {}", self.default_network))
            })
    }
}

impl FeeSettings {
    pub fn resolve(&self) -> FeeResult<FeeOptions> {
        Ok(FeeOptions {
            forced_model: FeeModel::parse_override(self.tx_type.as_deref())?,
            threshold: parse_gwei(&self.gas_price_threshold)?,
            markup: parse_markup(&self.gas_price_increment_factor)?,
            gate_timeout: self
                .gate_timeout
                .as_deref()
                .map(parse_wait_expression)
                .transpose()?,
        })
    }
}

/// Substitute variables in the format ${VAR_NAME}; unknown ones become empty
fn substitute_env_vars<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VAR
        .replace_all(input, |caps: &Captures| lookup(&caps[1]).unwrap_or_default())
        .into_owned()
}

/// Parse a decimal gwei amount into wei
pub fn parse_gwei(value: &str) -> FeeResult<U256> {
    let value = value.trim();
    if value.starts_with('-') {
        return Err(FeeError::config(format!(
            "Gas price threshold must not be negative: {}",
            value
        )));
    }

    parse_units(value, "gwei")
        .map(U256::from)
        .map_err(|e| FeeError::config(format!("Invalid gas price threshold {:?}: {}", value, e)))
}

/// Parse a non-negative markup factor such as "1.05"
pub fn parse_markup(value: &str) -> FeeResult<Decimal> {
    let factor = Decimal::from_str(value.trim())
        .map_err(|e| FeeError::config(format!("Invalid markup factor {:?}: {}", value, e)))?;

    if factor.is_sign_negative() {
        return Err(FeeError::config(format!(
            "Markup factor must not be negative: {}",
            factor
        )));
    }
    Ok(factor)
}

/// Parse `"<number> <unit>"`, e.g. "60 seconds" or "1 minute".
///
/// Units are `ms`, `s` and `m` with their long forms; a missing or
/// unknown unit means milliseconds.
pub fn parse_wait_expression(expression: &str) -> FeeResult<Duration> {
    let mut parts = expression.split_whitespace();
    let amount = parts.next().unwrap_or_default();

    let amount = Decimal::from_str(amount).map_err(|_| {
        FeeError::config(format!("Invalid wait expression: {:?}", expression))
    })?;
    if amount.is_sign_negative() {
        return Err(FeeError::config(format!(
            "Wait expression must not be negative: {:?}",
            expression
        )));
    }

    let millis_per_unit = match parts.next() {
        Some("m" | "minute" | "minutes") => 60_000,
        Some("s" | "second" | "seconds") => 1_000,
        _ => 1,
    };

    let millis = amount
        .checked_mul(Decimal::from(millis_per_unit))
        .and_then(|millis| millis.round().to_u64())
        .ok_or_else(|| FeeError::config(format!("Wait expression out of range: {:?}", expression)))?;

    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_network = "production"

[fees]
tx_type = "2"
gas_price_threshold = "30"
gas_price_increment_factor = "1.05"
gate_timeout = "10 minutes"
verbosity = "secondary-quiet"

[metrics]
textfile = "/tmp/feegate.prom"

[networks.production]
rpc_urls = ["${URL_PRODUCTION}"]
chain_id = 1

[networks.staging]
rpc_urls = ["${URL_STAGING}", "http://localhost:8545"]
rpc_timeout_ms = 2500
"#;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_env_var_substitution() {
        let lookup = env_of(&[("TEST_VAR", "test_value")]);
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint/${MISSING}\"";
        let result = substitute_env_vars(input, &lookup);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint/\"");
    }

    #[test]
    fn test_parse_sample() {
        let settings = Settings::parse(
            SAMPLE,
            env_of(&[
                ("URL_PRODUCTION", "https://eth.example.org"),
                ("URL_STAGING", "https://staging.example.org"),
            ]),
        )
        .unwrap();

        let (name, network) = settings.active_network().unwrap();
        assert_eq!(name, "production");
        assert_eq!(network.rpc_urls, vec!["https://eth.example.org"]);
        assert_eq!(network.rpc_timeout(), Duration::from_secs(10));
        assert_eq!(network.chain_id, Some(1));
        assert_eq!(settings.networks["staging"].rpc_timeout_ms, 2500);
        assert_eq!(settings.fees.verbosity, Verbosity::SecondaryQuiet);
        assert_eq!(
            settings.metrics.textfile.as_deref(),
            Some(Path::new("/tmp/feegate.prom"))
        );

        let options = settings.fees.resolve().unwrap();
        assert_eq!(
            options,
            FeeOptions {
                forced_model: Some(FeeModel::Dynamic),
                threshold: U256::from(30_000_000_000u64),
                markup: Decimal::new(105, 2),
                gate_timeout: Some(Duration::from_secs(600)),
            }
        );
    }

    #[test]
    fn test_environment_overrides() {
        let settings = Settings::parse(
            SAMPLE,
            env_of(&[
                ("URL_PRODUCTION", "https://eth.example.org"),
                ("URL_STAGING", "https://staging.example.org"),
                ("TX_TYPE_STATIC", "0"),
                ("GAS_PRICE_THRESHOLD", "0"),
                ("GAS_PRICE_INCREMENT_FACTOR", ""),
                ("FEEGATE_NETWORK", "staging"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.active_network().unwrap().0, "staging");

        let options = settings.fees.resolve().unwrap();
        assert_eq!(options.forced_model, Some(FeeModel::Legacy));
        assert!(options.threshold.is_zero());
        // empty values leave the file setting alone
        assert_eq!(options.markup, Decimal::new(105, 2));
    }

    #[test]
    fn test_defaults() {
        let raw = "[networks.production]\nrpc_urls = [\"http://localhost:8545\"]\n";
        let settings = Settings::parse(raw, |_| None).unwrap();

        assert_eq!(settings.fees.verbosity, Verbosity::Verbose);
        assert!(settings.metrics.textfile.is_none());
        assert_eq!(settings.fees.resolve().unwrap(), FeeOptions::default());
    }

    #[test]
    fn test_rejects_unknown_network() {
        let raw = "[networks.production]\nrpc_urls = [\"http://localhost:8545\"]\n";
        let err = Settings::parse(raw, env_of(&[("FEEGATE_NETWORK", "goerli")])).unwrap_err();
        assert!(err.to_string().contains("Unknown network: goerli"));
    }

    #[test]
    fn test_rejects_network_without_urls() {
        // substitution of an unset variable leaves an empty URL
        let raw = "[networks.production]\nrpc_urls = [\"${URL_PRODUCTION}\"]\n";
        let err = Settings::parse(raw, |_| None).unwrap_err();
        assert!(err.to_string().contains("has no RPC URLs"));
    }

    #[test]
    fn test_rejects_invalid_fee_inputs() {
        let raw = "[networks.production]\nrpc_urls = [\"http://localhost:8545\"]\n";

        for (name, value) in [
            ("TX_TYPE_STATIC", "1"),
            ("GAS_PRICE_THRESHOLD", "cheap"),
            ("GAS_PRICE_THRESHOLD", "-5"),
            ("GAS_PRICE_INCREMENT_FACTOR", "-1.1"),
        ] {
            let lookup = move |key: &str| (key == name).then(|| value.to_string());
            let err = Settings::parse(raw, lookup).unwrap_err();
            let err = err.downcast_ref::<FeeError>().unwrap();
            assert!(err.is_configuration(), "{}={} accepted", name, value);
        }
    }

    #[test]
    fn test_oversized_gate_timeout_is_rejected() {
        let raw = "[fees]\ngate_timeout = \"79228162514264337593543950335 m\"\n\n[networks.production]\nrpc_urls = [\"http://localhost:8545\"]\n";
        let err = Settings::parse(raw, |_| None).unwrap_err();
        assert!(err.downcast_ref::<FeeError>().unwrap().is_configuration());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.toml");
        std::fs::write(
            &path,
            "default_network = \"local\"\n\n[networks.local]\nrpc_urls = [\"http://127.0.0.1:8545\"]\nchain_id = 31337\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        let (name, network) = settings.active_network().unwrap();
        assert_eq!(name, "local");
        assert_eq!(network.chain_id, Some(31337));

        let missing = Settings::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_parse_gwei() {
        assert_eq!(parse_gwei("30").unwrap(), U256::from(30_000_000_000u64));
        assert_eq!(parse_gwei("0.5").unwrap(), U256::from(500_000_000u64));
        assert!(parse_gwei("0").unwrap().is_zero());
    }

    #[test]
    fn test_parse_wait_expression() {
        assert_eq!(
            parse_wait_expression("60 seconds").unwrap(),
            Duration::from_secs(60)
        );
        assert_eq!(
            parse_wait_expression("1 minute").unwrap(),
            Duration::from_secs(60)
        );
        assert_eq!(
            parse_wait_expression("1.5 m").unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            parse_wait_expression("100 ms").unwrap(),
            Duration::from_millis(100)
        );
        assert_eq!(
            parse_wait_expression("250 fortnights").unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(parse_wait_expression("250").unwrap(), Duration::from_millis(250));

        assert!(parse_wait_expression("soon").unwrap_err().is_configuration());
        assert!(parse_wait_expression("-1 s").unwrap_err().is_configuration());
        assert!(parse_wait_expression("").is_err());
        assert!(parse_wait_expression("79228162514264337593543950335 minutes")
            .unwrap_err()
            .is_configuration());
    }
}
