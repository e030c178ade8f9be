use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::KeyMaterial;

/// Lifecycle state of a child agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildStatus {
    Active,
    Paused,
    Terminated,
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildStatus::Active => write!(f, "active"),
            ChildStatus::Paused => write!(f, "paused"),
            ChildStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// A worker agent created by the factory and tracked by the supervisor
#[derive(Debug, Serialize, Deserialize)]
pub struct ChildAgent {
    pub id: String,
    pub name: String,
    pub agent_type: String,
    pub description: String,
    pub wallet_address: String,

    /// Never persisted; restored agents come back without a signer
    #[serde(skip)]
    pub key_material: Option<KeyMaterial>,

    /// Where the cloned execution template lives
    pub template_handle: String,
    pub registry_tx: Option<String>,
    pub token_ref: Option<String>,

    /// False when the seed transfer failed and the wallet needs a manual top-up
    pub funded: bool,
    pub created_at: DateTime<Utc>,
    pub status: ChildStatus,
}

impl ChildAgent {
    /// Time since creation
    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.status == ChildStatus::Active
    }

    /// A copy of the public fields, safe to hand to the presentation layer
    pub fn summary(&self) -> ChildSummary {
        ChildSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            agent_type: self.agent_type.clone(),
            wallet_address: self.wallet_address.clone(),
            template_handle: self.template_handle.clone(),
            token_ref: self.token_ref.clone(),
            funded: self.funded,
            created_at: self.created_at,
            age_secs: self.age().num_seconds(),
            status: self.status,
        }
    }
}

/// Read-only view of a child agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSummary {
    pub id: String,
    pub name: String,
    pub agent_type: String,
    pub wallet_address: String,
    pub template_handle: String,
    pub token_ref: Option<String>,
    pub funded: bool,
    pub created_at: DateTime<Utc>,
    pub age_secs: i64,
    pub status: ChildStatus,
}

#[cfg(test)]
pub(crate) fn test_agent(id: &str, agent_type: &str) -> ChildAgent {
    ChildAgent {
        id: id.to_string(),
        name: format!("{}Agent", agent_type),
        agent_type: agent_type.to_string(),
        description: format!("{} agent mentioned", agent_type),
        wallet_address: format!("0x{}", id),
        key_material: None,
        template_handle: format!("agents/{}.py", id),
        registry_tx: None,
        token_ref: None,
        funded: true,
        created_at: Utc::now(),
        status: ChildStatus::Active,
    }
}
