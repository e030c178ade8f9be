use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::keys::{KeyMaterial, Keypair};

/// Confirmed value transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction reference
    pub tx_hash: String,

    /// Sending wallet
    pub from: String,

    /// Receiving wallet
    pub to: String,

    /// Amount moved, in native units
    pub amount: Decimal,
}

/// Chain access interface
///
/// Calls resolve only once the transfer is confirmed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Network child wallets are created on
    fn network(&self) -> String;

    /// Address of the parent treasury wallet
    fn parent_address(&self) -> String;

    /// Current balance of a wallet
    async fn get_balance(&self, address: &str) -> Result<Decimal>;

    /// Send value from the parent wallet
    async fn send_value(&self, to: &str, amount: Decimal) -> Result<Receipt>;

    /// Send value from a child wallet, signed with its key
    async fn send_from(&self, key: &KeyMaterial, to: &str, amount: Decimal) -> Result<Receipt>;

    /// Create a fresh wallet on the same network as the parent
    async fn create_keypair(&self) -> Result<Keypair>;
}
