//! Agent factory
//!
//! Turns an accepted opportunity into a funded, registered child agent:
//! 1. Allocate id and display name
//! 2. Create a wallet on the parent's network
//! 3. Fund it with the seed amount (failure tolerated)
//! 4. Clone the execution template
//! 5. Register on-chain and launch the token

use chrono::Utc;
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::registration::Registrar;
use super::templates::TemplateStore;
use crate::chain::ChainClient;
use crate::core::child::{ChildAgent, ChildStatus};
use crate::core::error::MoltiError;
use crate::treasury::Treasury;

/// Builds child agents
pub struct AgentFactory {
    chain: Arc<dyn ChainClient>,
    treasury: Arc<Treasury>,
    templates: Arc<dyn TemplateStore>,
    registrar: Arc<dyn Registrar>,
    seed_amount: Decimal,
    sequence: AtomicU64,
}

impl AgentFactory {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        treasury: Arc<Treasury>,
        templates: Arc<dyn TemplateStore>,
        registrar: Arc<dyn Registrar>,
        seed_amount: Decimal,
    ) -> Self {
        Self {
            chain,
            treasury,
            templates,
            registrar,
            seed_amount,
            sequence: AtomicU64::new(0),
        }
    }

    /// Continue numbering after agents restored from a snapshot
    pub fn resume_sequence(&self, last: u64) {
        self.sequence.fetch_max(last, Ordering::SeqCst);
    }

    /// Run the creation pipeline.
    ///
    /// A failed seed transfer leaves the agent unfunded but still returns it.
    /// Any other failure aborts and nothing is returned.
    pub async fn create_agent(
        &self,
        agent_type: &str,
        description: &str,
        parent_wallet: &str,
    ) -> Result<ChildAgent, MoltiError> {
        info!("Generating {} agent", agent_type);

        let parent_address = self.chain.parent_address();
        if parent_wallet != parent_address {
            return Err(MoltiError::creation(
                agent_type,
                format!(
                    "parent wallet {} does not match chain signer {}",
                    parent_wallet, parent_address
                ),
            ));
        }

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let id = format!("{}-{}-{}", agent_type, seq, nanos);
        let name = format!("{}Agent #{}", capitalize(agent_type), seq);
        info!("Agent id: {}, name: {}", id, name);

        let keypair = self
            .chain
            .create_keypair()
            .await
            .map_err(|e| MoltiError::creation(agent_type, format!("{:#}", e)))?;
        info!(
            "Created wallet {} on {}",
            keypair.address,
            self.chain.network()
        );

        let funded = match self.treasury.fund(&keypair.address, self.seed_amount).await {
            Ok(receipt) => {
                info!("Funded {} with {} ({})", id, receipt.amount, receipt.tx_hash);
                true
            }
            Err(e) => {
                warn!("{:#}; agent {} needs a manual top-up", e, id);
                false
            }
        };

        let template = self
            .templates
            .resolve(agent_type)
            .map_err(|e| MoltiError::creation(agent_type, format!("{:#}", e)))?;
        let instance = self
            .templates
            .clone_template(&template, &id)
            .await
            .map_err(|e| MoltiError::creation(agent_type, format!("{:#}", e)))?;

        let registry_tx = self
            .registrar
            .register_agent(&id, &name, &keypair.address)
            .await
            .map_err(|e| {
                MoltiError::creation(
                    agent_type,
                    MoltiError::RegistrationError(format!("register_agent: {:#}", e)),
                )
            })?;
        let token_ref = self
            .registrar
            .launch_token(&name, &id)
            .await
            .map_err(|e| {
                MoltiError::creation(
                    agent_type,
                    MoltiError::RegistrationError(format!("launch_token: {:#}", e)),
                )
            })?;

        info!("Agent {} created", id);
        Ok(ChildAgent {
            id,
            name,
            agent_type: agent_type.to_string(),
            description: description.to_string(),
            wallet_address: keypair.address,
            key_material: Some(keypair.key_material),
            template_handle: instance.display(),
            registry_tx,
            token_ref,
            funded,
            created_at: Utc::now(),
            status: ChildStatus::Active,
        })
    }
}

/// Sequence number embedded in an agent id (`<type>-<seq>-<nanos>`)
pub fn sequence_of(agent_id: &str) -> Option<u64> {
    let mut parts = agent_id.rsplitn(3, '-');
    parts.next()?;
    parts.next()?.parse().ok()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
