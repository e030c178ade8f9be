pub mod manager;

pub use manager::{AgentMetrics, Treasury, TreasurySnapshot};
