use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use super::child::ChildSummary;
use super::evaluator::Decision;
use crate::signals::Opportunity;
use crate::treasury::TreasurySnapshot;

/// Supervisor phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisorState {
    Idle,
    Scanning,
    Evaluating,
    Spawning,
    Monitoring,
    Sleeping,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Scanning => "scanning",
            SupervisorState::Evaluating => "evaluating",
            SupervisorState::Spawning => "spawning",
            SupervisorState::Monitoring => "monitoring",
            SupervisorState::Sleeping => "sleeping",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Summary of one scan → evaluate → spawn → monitor cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub opportunities: usize,
    pub spawned: Vec<String>,
    pub duplicates: usize,
    pub rejected: usize,
    pub spawn_failures: usize,
    pub source_failures: usize,
    pub underperforming: Vec<String>,
    pub inactive: Vec<String>,
    pub refunded: Vec<String>,

    /// Active agents skipped by top-ups because no signing key is held
    pub unsigned: Vec<String>,

    pub collected: Decimal,
    pub snapshot: Option<TreasurySnapshot>,
}

/// Typed record of what the supervisor did, delivered on a broadcast channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupervisorEvent {
    StateChanged {
        from: SupervisorState,
        to: SupervisorState,
    },
    SourceFailed {
        message: String,
    },
    OpportunityEvaluated {
        opportunity: Opportunity,
        decision: Decision,
    },
    AgentSpawned {
        agent: ChildSummary,
    },
    AgentUnfunded {
        agent_id: String,
    },
    SpawnFailed {
        agent_type: String,
        message: String,
    },
    Underperforming {
        agent_id: String,
        executions: u64,
        age_hours: i64,
    },
    AgentStatusChanged {
        agent_id: String,
        status: super::child::ChildStatus,
    },
    CycleCompleted {
        report: CycleReport,
    },
    CycleFailed {
        message: String,
        backoff_secs: u64,
    },
}
