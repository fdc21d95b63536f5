//! Transaction fee model detection

use super::quote::RawFeeData;
use crate::chain::NodeClient;
use crate::error::{FeeError, FeeResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Fee model a session submits transactions with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeModel {
    /// Single `gasPrice` bid (type 0)
    Legacy,
    /// `maxFeePerGas` + `maxPriorityFeePerGas` bid (type 2, EIP-1559)
    Dynamic,
}

impl FeeModel {
    /// EIP-2718 transaction type byte
    pub fn tx_type(self) -> u8 {
        match self {
            FeeModel::Legacy => 0,
            FeeModel::Dynamic => 2,
        }
    }

    /// Name of the field compared against thresholds and marked up
    pub fn primary_field(self) -> &'static str {
        match self {
            FeeModel::Legacy => "gasPrice",
            FeeModel::Dynamic => "maxFeePerGas",
        }
    }

    /// Parse an optional override where an empty value means "detect".
    pub fn parse_override(value: Option<&str>) -> FeeResult<Option<FeeModel>> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => v.parse().map(Some),
        }
    }
}

impl fmt::Display for FeeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeModel::Legacy => write!(f, "legacy"),
            FeeModel::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl FromStr for FeeModel {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "type0" | "legacy" => Ok(FeeModel::Legacy),
            "2" | "type2" | "dynamic" | "eip1559" | "eip-1559" => Ok(FeeModel::Dynamic),
            other => Err(FeeError::config(format!(
                "unrecognized fee model '{}' (expected 0, 2, legacy or dynamic)",
                other
            ))),
        }
    }
}

/// Result of the one-time model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeModelDecision {
    pub model: FeeModel,
    /// Dynamic fees were forced but the node cannot honor them
    pub downgraded: bool,
}

/// Chooses the session fee model from node capability and an optional override
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeModelSelector {
    forced: Option<FeeModel>,
}

impl FeeModelSelector {
    pub fn new(forced: Option<FeeModel>) -> Self {
        Self { forced }
    }

    pub fn forced(&self) -> Option<FeeModel> {
        self.forced
    }

    /// Apply the selection table to an unbiased node quote
    pub fn decide(&self, raw: &RawFeeData) -> FeeModelDecision {
        let supports_dynamic = raw.supports_dynamic();

        match self.forced {
            Some(FeeModel::Legacy) => FeeModelDecision {
                model: FeeModel::Legacy,
                downgraded: false,
            },
            Some(FeeModel::Dynamic) if !supports_dynamic => FeeModelDecision {
                model: FeeModel::Legacy,
                downgraded: true,
            },
            _ => FeeModelDecision {
                model: if supports_dynamic {
                    FeeModel::Dynamic
                } else {
                    FeeModel::Legacy
                },
                downgraded: false,
            },
        }
    }

    /// Query the node once and decide
    pub async fn select<N: NodeClient + ?Sized>(&self, node: &N) -> FeeResult<FeeModelDecision> {
        let raw = node.fee_data().await?;
        let decision = self.decide(&raw);

        if decision.downgraded {
            warn!("Dynamic fees were requested but the node reports no maxFeePerGas, falling back to legacy");
        } else {
            debug!(
                "Fee model {} selected (forced: {:?})",
                decision.model, self.forced
            );
        }

        crate::metrics::record_fee_model(decision.model);
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use crate::testing::{dynamic_fee_data, legacy_fee_data};

    #[test]
    fn test_selection_table() {
        let dynamic = dynamic_fee_data(30, 2);
        let legacy = legacy_fee_data(30);

        let cases = [
            (Some(FeeModel::Dynamic), &dynamic, FeeModel::Dynamic, false),
            (Some(FeeModel::Dynamic), &legacy, FeeModel::Legacy, true),
            (Some(FeeModel::Legacy), &dynamic, FeeModel::Legacy, false),
            (Some(FeeModel::Legacy), &legacy, FeeModel::Legacy, false),
            (None, &dynamic, FeeModel::Dynamic, false),
            (None, &legacy, FeeModel::Legacy, false),
        ];

        for (forced, raw, model, downgraded) in cases {
            let decision = FeeModelSelector::new(forced).decide(raw);
            assert_eq!(
                decision,
                FeeModelDecision { model, downgraded },
                "forced {:?}",
                forced
            );
        }
    }

    #[tokio::test]
    async fn test_forced_dynamic_downgrades_without_error() {
        let mut node = MockNodeClient::new();
        node.expect_fee_data()
            .times(1)
            .returning(|| Ok(legacy_fee_data(15)));

        let decision = FeeModelSelector::new(Some(FeeModel::Dynamic))
            .select(&node)
            .await
            .unwrap();

        assert_eq!(decision.model, FeeModel::Legacy);
        assert!(decision.downgraded);
    }

    #[tokio::test]
    async fn test_select_propagates_node_failure() {
        let mut node = MockNodeClient::new();
        node.expect_fee_data()
            .returning(|| Err(FeeError::node("connection refused")));

        let err = FeeModelSelector::default().select(&node).await.unwrap_err();
        assert!(matches!(err, FeeError::NodeUnavailable { .. }));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(FeeModel::parse_override(None).unwrap(), None);
        assert_eq!(FeeModel::parse_override(Some("  ")).unwrap(), None);
        assert_eq!(
            FeeModel::parse_override(Some("2")).unwrap(),
            Some(FeeModel::Dynamic)
        );
        assert_eq!(
            FeeModel::parse_override(Some("Legacy")).unwrap(),
            Some(FeeModel::Legacy)
        );
        assert!(FeeModel::parse_override(Some("1"))
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_tx_type() {
        assert_eq!(FeeModel::Legacy.tx_type(), 0);
        assert_eq!(FeeModel::Dynamic.tx_type(), 2);
        assert_eq!(FeeModel::Dynamic.primary_field(), "maxFeePerGas");
    }
}
