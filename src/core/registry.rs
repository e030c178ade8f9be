use anyhow::{anyhow, Result};
use log::info;

use super::child::{ChildAgent, ChildStatus, ChildSummary};

/// In-memory registry of child agents, in creation order
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<ChildAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent; ids must be unique
    pub fn insert(&mut self, agent: ChildAgent) -> Result<()> {
        if self.get(&agent.id).is_some() {
            return Err(anyhow!("Agent id already registered: {}", agent.id));
        }
        self.agents.push(agent);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ChildAgent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ChildAgent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    /// The active agent serving a type, if any (exact match)
    pub fn active_of_type(&self, agent_type: &str) -> Option<&ChildAgent> {
        self.agents
            .iter()
            .find(|a| a.is_active() && a.agent_type == agent_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildAgent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn summaries(&self) -> Vec<ChildSummary> {
        self.agents.iter().map(ChildAgent::summary).collect()
    }

    /// Move an agent to a new status, returning the previous one.
    ///
    /// Terminated agents stay terminated, and an agent can only be reactivated
    /// when no other active agent serves its type.
    pub fn set_status(&mut self, id: &str, status: ChildStatus) -> Result<ChildStatus> {
        let (agent_type, previous) = {
            let agent = self
                .get(id)
                .ok_or_else(|| anyhow!("Unknown agent: {}", id))?;
            (agent.agent_type.clone(), agent.status)
        };

        if previous == ChildStatus::Terminated && status != ChildStatus::Terminated {
            return Err(anyhow!("Agent {} is terminated", id));
        }
        if status == ChildStatus::Active && previous != ChildStatus::Active {
            if let Some(other) = self.active_of_type(&agent_type) {
                return Err(anyhow!(
                    "Type '{}' is already served by active agent {}",
                    agent_type,
                    other.id
                ));
            }
        }

        if let Some(agent) = self.get_mut(id) {
            agent.status = status;
        }
        info!("Agent {} status {} -> {}", id, previous, status);
        Ok(previous)
    }

    /// Replace the contents with a restored snapshot, keeping only the first
    /// record for a duplicated id
    pub fn restore(&mut self, agents: Vec<ChildAgent>) {
        self.agents.clear();
        for agent in agents {
            if self.get(&agent.id).is_none() {
                self.agents.push(agent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::child::test_agent;

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent("trader-1-1", "trader")).unwrap();
        assert!(registry.insert(test_agent("trader-1-1", "trader")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_active_of_type_ignores_paused() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent("trader-1-1", "trader")).unwrap();
        registry
            .set_status("trader-1-1", ChildStatus::Paused)
            .unwrap();
        assert!(registry.active_of_type("trader").is_none());
    }

    #[test]
    fn test_active_of_type_is_exact_match() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent("trader-1-1", "trader")).unwrap();
        assert!(registry.active_of_type("traders").is_none());
        assert!(registry.active_of_type("trader").is_some());
    }

    #[test]
    fn test_terminated_cannot_resume() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent("meme-1-1", "meme")).unwrap();
        registry
            .set_status("meme-1-1", ChildStatus::Terminated)
            .unwrap();
        assert!(registry.set_status("meme-1-1", ChildStatus::Active).is_err());
    }

    #[test]
    fn test_resume_blocked_by_other_active_agent() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent("meme-1-1", "meme")).unwrap();
        registry.set_status("meme-1-1", ChildStatus::Paused).unwrap();
        registry.insert(test_agent("meme-2-2", "meme")).unwrap();

        assert!(registry.set_status("meme-1-1", ChildStatus::Active).is_err());
    }
}
