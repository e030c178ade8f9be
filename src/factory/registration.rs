use anyhow::Result;
use async_trait::async_trait;
use log::info;

/// On-chain registry and token launch interface.
///
/// `None` means the call was accepted but produced no reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Record the agent in the on-chain registry, returning the transaction reference
    async fn register_agent(
        &self,
        agent_id: &str,
        name: &str,
        wallet_address: &str,
    ) -> Result<Option<String>>;

    /// Launch the agent's token, returning the token reference
    async fn launch_token(&self, name: &str, agent_id: &str) -> Result<Option<String>>;
}

/// Registrar used until the registry contract and launchpad are wired up
#[derive(Debug, Default)]
pub struct StubRegistrar;

#[async_trait]
impl Registrar for StubRegistrar {
    async fn register_agent(
        &self,
        agent_id: &str,
        _name: &str,
        _wallet_address: &str,
    ) -> Result<Option<String>> {
        info!("Skipping registry entry for {} (registry not deployed)", agent_id);
        Ok(None)
    }

    async fn launch_token(&self, _name: &str, agent_id: &str) -> Result<Option<String>> {
        info!("Skipping token launch for {} (launchpad pending)", agent_id);
        Ok(None)
    }
}
