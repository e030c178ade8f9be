//! Supervisor core: configuration, errors, the agent registry and the control loop.

pub mod child;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod persistence;
pub mod registry;
pub mod shutdown;
pub mod supervisor;

pub use child::{ChildAgent, ChildStatus, ChildSummary};
pub use config::Config;
pub use error::MoltiError;
pub use evaluator::{Decision, Evaluator};
pub use events::{CycleReport, SupervisorEvent, SupervisorState};
pub use persistence::PersistenceManager;
pub use registry::AgentRegistry;
pub use shutdown::Shutdown;
pub use supervisor::Supervisor;
