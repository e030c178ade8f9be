use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a source observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalPayload {
    /// Free text, with the number of mentions the source attributes to it
    Text { text: String, mentions: u64 },

    /// A listed agent token and its trading volume
    Token {
        name: String,
        volume: u64,
        agent_type: String,
    },
}

/// Raw observation from a discovery source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub payload: SignalPayload,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

impl Signal {
    pub fn text(source: impl Into<String>, text: impl Into<String>, mentions: u64) -> Self {
        Self {
            payload: SignalPayload::Text {
                text: text.into(),
                mentions,
            },
            source: source.into(),
            observed_at: Utc::now(),
        }
    }

    pub fn token(
        source: impl Into<String>,
        name: impl Into<String>,
        volume: u64,
        agent_type: impl Into<String>,
    ) -> Self {
        Self {
            payload: SignalPayload::Token {
                name: name.into(),
                volume,
                agent_type: agent_type.into(),
            },
            source: source.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Typed candidate for spawning a new agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub agent_type: String,
    pub description: String,
    pub mentions: u64,
    pub source: String,
    pub trending: bool,

    /// Set by the evaluator, always within 0..=10
    pub score: Option<u8>,
}

impl Opportunity {
    pub fn new(
        agent_type: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            agent_type: agent_type.into(),
            description: description.into(),
            mentions: 1,
            source: source.into(),
            trending: false,
            score: None,
        }
    }

    pub fn with_mentions(mut self, mentions: u64) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn trending(mut self) -> Self {
        self.trending = true;
        self
    }
}
