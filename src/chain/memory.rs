//! Simulated ledger used when no live chain is wired up.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::client::{ChainClient, Receipt};
use super::keys::{address_for_key, generate_keypair, KeyMaterial, Keypair};
use crate::core::error::MoltiError;

/// In-memory chain with exact balances and a transfer log
pub struct InMemoryChain {
    network: String,
    parent_address: String,
    balances: Mutex<HashMap<String, Decimal>>,
    transfers: Mutex<Vec<Receipt>>,
}

impl InMemoryChain {
    /// Create a ledger with a freshly generated parent wallet
    pub fn new(network: impl Into<String>, parent_balance: Decimal) -> Result<Self> {
        let parent = generate_keypair()?;
        Ok(Self::with_parent(network, parent.address, parent_balance))
    }

    /// Create a ledger around a known parent address
    pub fn with_parent(
        network: impl Into<String>,
        parent_address: impl Into<String>,
        parent_balance: Decimal,
    ) -> Self {
        let parent_address = parent_address.into();
        let mut balances = HashMap::new();
        balances.insert(parent_address.clone(), parent_balance);

        Self {
            network: network.into(),
            parent_address,
            balances: Mutex::new(balances),
            transfers: Mutex::new(Vec::new()),
        }
    }

    /// Overwrite a wallet balance
    pub fn set_balance(&self, address: &str, amount: Decimal) {
        self.lock_balances().insert(address.to_string(), amount);
    }

    /// Every confirmed transfer, oldest first
    pub fn transfers(&self) -> Vec<Receipt> {
        match self.transfers.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_balances(&self) -> std::sync::MutexGuard<'_, HashMap<String, Decimal>> {
        match self.balances.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn transfer(&self, from: &str, to: &str, amount: Decimal) -> Result<Receipt> {
        if amount <= Decimal::ZERO {
            return Err(MoltiError::ChainError(format!(
                "Transfer amount must be positive, got {}",
                amount
            ))
            .into());
        }

        {
            let mut balances = self.lock_balances();
            let available = balances.get(from).copied().unwrap_or(Decimal::ZERO);
            if available < amount {
                return Err(MoltiError::ChainError(format!(
                    "Insufficient funds in {}: {} < {}",
                    from, available, amount
                ))
                .into());
            }
            balances.insert(from.to_string(), available - amount);
            *balances.entry(to.to_string()).or_insert(Decimal::ZERO) += amount;
        }

        let receipt = Receipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
            from: from.to_string(),
            to: to.to_string(),
            amount,
        };
        debug!("Confirmed transfer {} of {} from {} to {}", receipt.tx_hash, amount, from, to);

        match self.transfers.lock() {
            Ok(mut guard) => guard.push(receipt.clone()),
            Err(poisoned) => poisoned.into_inner().push(receipt.clone()),
        }
        Ok(receipt)
    }
}

#[async_trait]
impl ChainClient for InMemoryChain {
    fn network(&self) -> String {
        self.network.clone()
    }

    fn parent_address(&self) -> String {
        self.parent_address.clone()
    }

    async fn get_balance(&self, address: &str) -> Result<Decimal> {
        Ok(self
            .lock_balances()
            .get(address)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn send_value(&self, to: &str, amount: Decimal) -> Result<Receipt> {
        let from = self.parent_address.clone();
        self.transfer(&from, to, amount)
    }

    async fn send_from(&self, key: &KeyMaterial, to: &str, amount: Decimal) -> Result<Receipt> {
        let from = address_for_key(key).map_err(|e| anyhow!("Cannot sign transfer: {}", e))?;
        self.transfer(&from, to, amount)
    }

    async fn create_keypair(&self) -> Result<Keypair> {
        let pair = generate_keypair()?;
        self.lock_balances()
            .entry(pair.address.clone())
            .or_insert(Decimal::ZERO);
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_send_value_moves_exact_amount() {
        let chain = InMemoryChain::with_parent("testnet", "0xparent", dec!(1));
        let receipt = chain.send_value("0xchild", dec!(0.1)).await.unwrap();

        assert_eq!(receipt.amount, dec!(0.1));
        assert_eq!(chain.get_balance("0xparent").await.unwrap(), dec!(0.9));
        assert_eq!(chain.get_balance("0xchild").await.unwrap(), dec!(0.1));
        assert_eq!(chain.transfers().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_rejected() {
        let chain = InMemoryChain::with_parent("testnet", "0xparent", dec!(0.05));
        assert!(chain.send_value("0xchild", dec!(0.1)).await.is_err());
        assert_eq!(chain.get_balance("0xparent").await.unwrap(), dec!(0.05));
        assert!(chain.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_send_from_child_uses_key_address() {
        let chain = InMemoryChain::with_parent("testnet", "0xparent", dec!(1));
        let child = chain.create_keypair().await.unwrap();
        chain.send_value(&child.address, dec!(0.5)).await.unwrap();

        chain
            .send_from(&child.key_material, "0xparent", dec!(0.2))
            .await
            .unwrap();

        assert_eq!(chain.get_balance(&child.address).await.unwrap(), dec!(0.3));
        assert_eq!(chain.get_balance("0xparent").await.unwrap(), dec!(0.7));
    }

    #[tokio::test]
    async fn test_unknown_wallet_has_zero_balance() {
        let chain = InMemoryChain::with_parent("testnet", "0xparent", dec!(1));
        assert_eq!(chain.get_balance("0xnobody").await.unwrap(), Decimal::ZERO);
    }
}
