//! Chain provider with multi-RPC support and automatic failover

use super::{NodeClient, TxSummary};
use crate::config::NetworkConfig;
use crate::error::{FeeError, FeeResult};
use crate::fees::RawFeeData;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Priority fee assumed when the node has no `eth_maxPriorityFeePerGas`
pub const DEFAULT_PRIORITY_FEE: u64 = 1_000_000_000;

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    /// Network name from configuration
    network: String,
    config: NetworkConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Create a new chain provider; no request is made until first use
    pub fn new(network: &str, config: NetworkConfig) -> FeeResult<Self> {
        let mut http_providers = Vec::new();

        for url in config.rpc_urls.iter().filter(|url| !url.trim().is_empty()) {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    http_providers.push(provider);
                    debug!("Added HTTP provider for network {}: {}", network, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(FeeError::config(format!(
                "Network {} has no valid RPC providers",
                network
            )));
        }

        Ok(Self {
            network: network.to_string(),
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Chain id the configuration expects, if any
    pub fn expected_chain_id(&self) -> Option<u64> {
        self.config.chain_id
    }

    fn request_timeout(&self) -> Duration {
        self.config.rpc_timeout()
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Network {} failover to provider {}", self.network, next);
    }

    /// Run `request` against each provider in turn until one answers in time
    async fn call<T, F, Fut>(&self, method: &str, request: F) -> FeeResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        for _ in 0..self.http_providers.len() {
            match timeout(self.request_timeout(), request(self.http().clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    warn!("{} failed on network {}: {}", method, self.network, e);
                }
                Err(_) => {
                    warn!(
                        "{} timed out after {:?} on network {}",
                        method,
                        self.request_timeout(),
                        self.network
                    );
                }
            }
            self.failover();
        }

        Err(FeeError::node(format!(
            "{}: all providers failed for network {}",
            method, self.network
        )))
    }

    /// `eth_maxPriorityFeePerGas`; `None` when the node lacks it or is slow
    async fn max_priority_fee(&self) -> Option<U256> {
        let request = self
            .http()
            .request::<_, U256>("eth_maxPriorityFeePerGas", ());

        match timeout(self.request_timeout(), request).await {
            Ok(Ok(fee)) => Some(fee),
            Ok(Err(e)) => {
                debug!("eth_maxPriorityFeePerGas unavailable ({}), using default", e);
                None
            }
            Err(_) => {
                debug!("eth_maxPriorityFeePerGas timed out, using default");
                None
            }
        }
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.block_number().await {
            Ok(_) => true,
            Err(e) => {
                error!("Health check failed for network {}: {}", self.network, e);
                false
            }
        }
    }
}

/// Assemble fee data the way `getFeeData` does: dynamic fields only when the
/// latest block has a base fee, with `maxFeePerGas = 2 * baseFee + priority`
/// and [`DEFAULT_PRIORITY_FEE`] when no priority fee was reported.
fn raw_fee_data(
    gas_price: U256,
    base_fee: Option<U256>,
    priority_fee: Option<U256>,
) -> FeeResult<RawFeeData> {
    let Some(base_fee) = base_fee else {
        return Ok(RawFeeData {
            gas_price: Some(gas_price),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        });
    };

    let priority_fee = priority_fee.unwrap_or_else(|| U256::from(DEFAULT_PRIORITY_FEE));
    let max_fee = base_fee
        .checked_mul(U256::from(2))
        .and_then(|fee| fee.checked_add(priority_fee))
        .ok_or_else(|| FeeError::node(format!("Base fee {} out of range", base_fee)))?;

    Ok(RawFeeData {
        gas_price: Some(gas_price),
        max_fee_per_gas: Some(max_fee),
        max_priority_fee_per_gas: Some(priority_fee),
    })
}

/// Narrow a node-reported quantity to `u64`
fn to_u64(value: U256, what: &str) -> FeeResult<u64> {
    u64::try_from(value).map_err(|_| FeeError::node(format!("{} {} out of range", what, value)))
}

#[async_trait]
impl NodeClient for ChainProvider {
    async fn chain_id(&self) -> FeeResult<u64> {
        let chain_id = self
            .call("eth_chainId", |provider| async move {
                provider.get_chainid().await
            })
            .await?;
        to_u64(chain_id, "Chain id")
    }

    async fn block_number(&self) -> FeeResult<u64> {
        let block = self
            .call("eth_blockNumber", |provider| async move {
                provider.get_block_number().await
            })
            .await?;
        Ok(block.as_u64())
    }

    async fn block_timestamp(&self, number: u64) -> FeeResult<u64> {
        let block = self
            .call("eth_getBlockByNumber", |provider| async move {
                provider.get_block(number).await
            })
            .await?
            .ok_or_else(|| FeeError::node(format!("Block {} not found", number)))?;
        to_u64(block.timestamp, "Block timestamp")
    }

    async fn fee_data(&self) -> FeeResult<RawFeeData> {
        let (gas_price, latest) = futures::try_join!(
            self.call("eth_gasPrice", |provider| async move {
                provider.get_gas_price().await
            }),
            self.call("eth_getBlockByNumber", |provider| async move {
                provider.get_block(BlockNumber::Latest).await
            })
        )?;

        let base_fee = latest.and_then(|block| block.base_fee_per_gas);
        let priority_fee = match base_fee {
            Some(_) => self.max_priority_fee().await,
            None => None,
        };

        raw_fee_data(gas_price, base_fee, priority_fee)
    }

    async fn block_transactions(&self, number: u64) -> FeeResult<Vec<TxSummary>> {
        let block = self
            .call("eth_getBlockByNumber", |provider| async move {
                provider.get_block_with_txs(number).await
            })
            .await?
            .ok_or_else(|| FeeError::node(format!("Block {} not found", number)))?;

        Ok(block
            .transactions
            .into_iter()
            .map(|tx| TxSummary {
                hash: tx.hash,
                from: tx.from,
                to: tx.to,
                block_number: tx.block_number.map(|n| n.as_u64()).unwrap_or(number),
            })
            .collect())
    }
}
