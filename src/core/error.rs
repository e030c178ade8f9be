use rust_decimal::Decimal;
use thiserror::Error;

/// Custom error types for the Molti-Maker supervisor
#[derive(Error, Debug)]
pub enum MoltiError {
    /// A discovery source failed during a scan
    #[error("Discovery source '{source_name}' unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    /// Seed or replenishment transfer failed
    #[error("Funding of {amount} to {address} failed: {message}")]
    FundingFailure {
        address: String,
        amount: Decimal,
        message: String,
    },

    /// A step of the agent creation pipeline failed
    #[error("Creation of {agent_type} agent failed: {message}")]
    CreationFailure { agent_type: String, message: String },

    /// A supervisor cycle failed at its top level
    #[error("Supervisor cycle failed: {0}")]
    LoopFailure(String),

    /// A wallet balance could not be read
    #[error("Metrics unavailable for {address}: {message}")]
    MetricsUnavailable { address: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Chain access errors
    #[error("Chain error: {0}")]
    ChainError(String),

    /// Template store errors
    #[error("Template error: {0}")]
    TemplateError(String),

    /// On-chain registry or token launch errors
    #[error("Registration error: {0}")]
    RegistrationError(String),

    /// Registry snapshot errors
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MoltiError {
    /// Wrap any pipeline error as a creation failure for the given agent type
    pub fn creation(agent_type: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MoltiError::CreationFailure {
            agent_type: agent_type.into(),
            message: err.to_string(),
        }
    }

    /// Short label used in event payloads and log prefixes
    pub fn kind(&self) -> &'static str {
        match self {
            MoltiError::SourceUnavailable { .. } => "source_unavailable",
            MoltiError::FundingFailure { .. } => "funding_failure",
            MoltiError::CreationFailure { .. } => "creation_failure",
            MoltiError::LoopFailure(_) => "loop_failure",
            MoltiError::MetricsUnavailable { .. } => "metrics_unavailable",
            MoltiError::ConfigError(_) => "config",
            MoltiError::ChainError(_) => "chain",
            MoltiError::TemplateError(_) => "template",
            MoltiError::RegistrationError(_) => "registration",
            MoltiError::PersistenceError(_) => "persistence",
            MoltiError::IoError(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_creation_wraps_message() {
        let err = MoltiError::creation("meme", "template missing");
        assert_eq!(err.kind(), "creation_failure");
        assert_eq!(
            err.to_string(),
            "Creation of meme agent failed: template missing"
        );
    }

    #[test]
    fn test_funding_failure_display() {
        let err = MoltiError::FundingFailure {
            address: "0xabc".to_string(),
            amount: dec!(0.1),
            message: "insufficient funds".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Funding of 0.1 to 0xabc failed: insufficient funds"
        );
    }
}
