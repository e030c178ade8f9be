//! Treasury manager
//!
//! Bookkeeping over the parent wallet and every tracked child wallet:
//! - Performance metrics (approximated from balance)
//! - Revenue collection (fee on child balances)
//! - Automated top-ups
//! - Aggregate fleet value

use anyhow::Result;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::chain::{ChainClient, Receipt};
use crate::core::child::ChildAgent;
use crate::core::config::TreasuryConfig;
use crate::core::error::MoltiError;

/// Performance metrics for one agent wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub executions: u64,
    pub revenue: Decimal,
    pub is_active: bool,
}

impl AgentMetrics {
    fn unavailable() -> Self {
        Self {
            executions: 0,
            revenue: Decimal::ZERO,
            is_active: false,
        }
    }
}

/// Point-in-time fleet value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasurySnapshot {
    pub parent_balance: Decimal,
    pub child_balances: BTreeMap<String, Decimal>,
    pub children: Decimal,
    pub total: Decimal,
}

/// Treasury over the parent wallet and the tracked agent wallets
pub struct Treasury {
    chain: Arc<dyn ChainClient>,
    config: TreasuryConfig,

    /// agent id -> wallet address
    agent_wallets: Mutex<BTreeMap<String, String>>,
}

impl Treasury {
    pub fn new(chain: Arc<dyn ChainClient>, config: TreasuryConfig) -> Self {
        Self {
            chain,
            config,
            agent_wallets: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn parent_address(&self) -> String {
        self.chain.parent_address()
    }

    /// Include an agent wallet in fleet valuation
    pub fn track(&self, agent_id: &str, wallet: &str) {
        self.wallets()
            .insert(agent_id.to_string(), wallet.to_string());
    }

    /// Drop an agent wallet from fleet valuation
    pub fn untrack(&self, agent_id: &str) -> Option<String> {
        self.wallets().remove(agent_id)
    }

    /// Tracked (agent id, wallet) pairs
    pub fn tracked(&self) -> Vec<(String, String)> {
        self.wallets()
            .iter()
            .map(|(id, wallet)| (id.clone(), wallet.clone()))
            .collect()
    }

    /// Metrics for an agent wallet.
    ///
    /// No execution ledger exists yet, so revenue is the raw wallet balance
    /// and executions are always zero. An unreadable balance reports the
    /// agent as inactive with zero metrics.
    pub async fn get_agent_metrics(&self, wallet: &str) -> AgentMetrics {
        match self.chain.get_balance(wallet).await {
            Ok(balance) => AgentMetrics {
                executions: 0,
                revenue: balance,
                is_active: true,
            },
            Err(e) => {
                let err = MoltiError::MetricsUnavailable {
                    address: wallet.to_string(),
                    message: format!("{:#}", e),
                };
                warn!("{}", err);
                AgentMetrics::unavailable()
            }
        }
    }

    /// Collect the fee share of an agent's balance into the parent wallet.
    ///
    /// Returns `None` when the fee is dust or the agent holds no signing key.
    pub async fn collect_revenue(&self, agent: &ChildAgent) -> Result<Option<Receipt>> {
        let balance = self.chain.get_balance(&agent.wallet_address).await?;
        let fee = balance * self.config.fee_rate;

        if fee <= self.config.dust_threshold {
            debug!(
                "Fee {} from {} is below dust threshold, skipping",
                fee, agent.wallet_address
            );
            return Ok(None);
        }

        let key = match &agent.key_material {
            Some(key) => key,
            None => {
                warn!(
                    "Cannot collect {} from {}: no signing key held",
                    fee, agent.wallet_address
                );
                return Ok(None);
            }
        };

        info!("Collecting {} from {}", fee, agent.wallet_address);
        let receipt = self
            .chain
            .send_from(key, &self.chain.parent_address(), fee)
            .await?;
        Ok(Some(receipt))
    }

    /// Top up a wallet below the configured minimum balance
    pub async fn ensure_funding(&self, wallet: &str) -> Result<Option<Receipt>> {
        self.ensure_funding_with(wallet, self.config.min_balance).await
    }

    /// Top up a wallet below `min_balance` with the configured refund amount.
    /// No-op when the balance is already at or above the minimum.
    pub async fn ensure_funding_with(
        &self,
        wallet: &str,
        min_balance: Decimal,
    ) -> Result<Option<Receipt>> {
        let balance = self.chain.get_balance(wallet).await?;
        if balance >= min_balance {
            return Ok(None);
        }

        info!("Refunding {} (balance {} < {})", wallet, balance, min_balance);
        let receipt = self.fund(wallet, self.config.refund_amount).await?;
        info!("Refunded {} to {}", receipt.amount, wallet);
        Ok(Some(receipt))
    }

    /// Send value from the parent wallet, mapping failures to `FundingFailure`
    pub async fn fund(&self, wallet: &str, amount: Decimal) -> Result<Receipt> {
        self.chain.send_value(wallet, amount).await.map_err(|e| {
            MoltiError::FundingFailure {
                address: wallet.to_string(),
                amount,
                message: format!("{:#}", e),
            }
            .into()
        })
    }

    /// Parent balance plus every tracked child balance
    pub async fn get_total_value(&self) -> Result<TreasurySnapshot> {
        let parent_balance = self.chain.get_balance(&self.chain.parent_address()).await?;

        let mut child_balances = BTreeMap::new();
        for (agent_id, wallet) in self.tracked() {
            let balance = self.chain.get_balance(&wallet).await?;
            child_balances.insert(agent_id, balance);
        }

        let children: Decimal = child_balances.values().copied().sum();
        Ok(TreasurySnapshot {
            parent_balance,
            child_balances,
            children,
            total: parent_balance + children,
        })
    }

    fn wallets(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        match self.agent_wallets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::MockChainClient;
    use crate::chain::{ChainClient, InMemoryChain, KeyMaterial};
    use crate::core::child::test_agent;
    use rust_decimal_macros::dec;

    fn treasury_with(chain: Arc<InMemoryChain>) -> Treasury {
        Treasury::new(chain, TreasuryConfig::default())
    }

    #[tokio::test]
    async fn test_ensure_funding_below_minimum_sends_refund() {
        let chain = Arc::new(InMemoryChain::with_parent("testnet", "0xparent", dec!(1)));
        chain.set_balance("0xchild", dec!(0.03));
        let treasury = treasury_with(Arc::clone(&chain));

        let receipt = treasury
            .ensure_funding_with("0xchild", dec!(0.05))
            .await
            .unwrap()
            .expect("transfer expected");

        assert_eq!(receipt.amount, dec!(0.1));
        assert_eq!(chain.transfers().len(), 1);
        assert_eq!(chain.get_balance("0xchild").await.unwrap(), dec!(0.13));
    }

    #[tokio::test]
    async fn test_ensure_funding_above_minimum_is_noop() {
        let chain = Arc::new(InMemoryChain::with_parent("testnet", "0xparent", dec!(1)));
        chain.set_balance("0xchild", dec!(0.06));
        let treasury = treasury_with(Arc::clone(&chain));

        for _ in 0..3 {
            assert!(treasury.ensure_funding("0xchild").await.unwrap().is_none());
        }
        assert!(chain.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_total_value_with_no_children_equals_parent() {
        let chain = Arc::new(InMemoryChain::with_parent("testnet", "0xparent", dec!(2.5)));
        let treasury = treasury_with(chain);

        let snapshot = treasury.get_total_value().await.unwrap();
        assert_eq!(snapshot.total, dec!(2.5));
        assert_eq!(snapshot.total, snapshot.parent_balance);
        assert!(snapshot.child_balances.is_empty());
    }

    #[tokio::test]
    async fn test_total_value_sums_children() {
        let chain = Arc::new(InMemoryChain::with_parent("testnet", "0xparent", dec!(2)));
        chain.set_balance("0xa", dec!(0.1));
        chain.set_balance("0xb", dec!(0.25));
        let treasury = treasury_with(chain);
        treasury.track("a", "0xa");
        treasury.track("b", "0xb");

        let snapshot = treasury.get_total_value().await.unwrap();
        assert_eq!(snapshot.children, dec!(0.35));
        assert_eq!(
            snapshot.total,
            snapshot.parent_balance + snapshot.child_balances.values().copied().sum::<Decimal>()
        );
    }

    #[tokio::test]
    async fn test_metrics_mirror_balance() {
        let chain = Arc::new(InMemoryChain::with_parent("testnet", "0xparent", dec!(1)));
        chain.set_balance("0xchild", dec!(0.4));
        let treasury = treasury_with(chain);

        let metrics = treasury.get_agent_metrics("0xchild").await;
        assert_eq!(metrics.revenue, dec!(0.4));
        assert_eq!(metrics.executions, 0);
        assert!(metrics.is_active);
    }

    #[tokio::test]
    async fn test_metrics_unavailable_reports_inactive() {
        let mut chain = MockChainClient::new();
        chain
            .expect_get_balance()
            .returning(|_| Err(anyhow::anyhow!("rpc timeout")));
        let treasury = Treasury::new(Arc::new(chain), TreasuryConfig::default());

        let metrics = treasury.get_agent_metrics("0xchild").await;
        assert_eq!(metrics, AgentMetrics::unavailable());
    }

    #[tokio::test]
    async fn test_collect_revenue_skips_dust() {
        let chain = Arc::new(InMemoryChain::with_parent("testnet", "0xparent", dec!(1)));
        let treasury = treasury_with(Arc::clone(&chain));
        let mut agent = test_agent("meme-1-1", "meme");
        chain.set_balance(&agent.wallet_address, dec!(0.1));
        agent.key_material = Some(KeyMaterial::new("unused"));

        assert!(treasury.collect_revenue(&agent).await.unwrap().is_none());
        assert!(chain.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_collect_revenue_moves_fee_to_parent() {
        let chain = Arc::new(InMemoryChain::with_parent("testnet", "0xparent", dec!(1)));
        let treasury = treasury_with(Arc::clone(&chain));
        let keypair = chain.create_keypair().await.unwrap();
        chain.set_balance(&keypair.address, dec!(2));

        let mut agent = test_agent("meme-1-1", "meme");
        agent.wallet_address = keypair.address.clone();
        agent.key_material = Some(keypair.key_material);

        let receipt = treasury.collect_revenue(&agent).await.unwrap().unwrap();
        assert_eq!(receipt.amount, dec!(0.2));
        assert_eq!(receipt.to, "0xparent");
        assert_eq!(chain.get_balance("0xparent").await.unwrap(), dec!(1.2));
    }

    #[tokio::test]
    async fn test_fund_failure_is_funding_failure() {
        let chain = Arc::new(InMemoryChain::with_parent("testnet", "0xparent", dec!(0)));
        let treasury = treasury_with(chain);

        let err = treasury.fund("0xchild", dec!(0.1)).await.unwrap_err();
        let molti = err.downcast_ref::<MoltiError>().unwrap();
        assert_eq!(molti.kind(), "funding_failure");
    }
}
