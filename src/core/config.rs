use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Environment variable prefix for overrides, e.g. `MOLTI__SUPERVISOR__SCAN_INTERVAL_SECS`
pub const ENV_PREFIX: &str = "MOLTI";

/// Top-level configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Chain access configuration
    pub chain: ChainConfig,

    /// Control loop configuration
    pub supervisor: SupervisorConfig,

    /// Discovery configuration
    pub scanner: ScannerConfig,

    /// Agent creation configuration
    pub factory: FactoryConfig,

    /// Treasury thresholds
    pub treasury: TreasuryConfig,

    /// Registry snapshot configuration
    pub persistence: PersistenceConfig,
}

/// Chain configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ChainConfig {
    /// Network name child wallets are bound to
    pub network: String,

    /// Opening balance of the parent wallet on the simulated ledger
    pub initial_parent_balance: Decimal,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network: "monad-testnet".to_string(),
            initial_parent_balance: dec!(10),
        }
    }
}

/// Supervisor loop configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Sleep between successful cycles
    pub scan_interval_secs: u64,

    /// Sleep after a failed cycle
    pub error_backoff_secs: u64,

    /// Minimum score for an opportunity to be spawned
    pub score_threshold: u8,

    /// Agents below this many executions may be flagged
    pub underperform_min_executions: u64,

    /// Agents younger than this are never flagged
    pub underperform_age_hours: i64,

    /// Top up low agent wallets during monitoring
    pub auto_refund: bool,

    /// Sweep the revenue fee from agent wallets during monitoring
    pub collect_revenue: bool,

    /// Buffered events per subscriber
    pub event_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 300,
            error_backoff_secs: 60,
            score_threshold: 7,
            underperform_min_executions: 5,
            underperform_age_hours: 24,
            auto_refund: true,
            collect_revenue: false,
            event_capacity: 64,
        }
    }
}

/// A fixed post served by the static post source
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PostConfig {
    pub text: String,
    #[serde(default = "default_mentions")]
    pub mentions: u64,
}

/// A fixed token listing served by the token volume source
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    pub name: String,
    pub volume: u64,
    pub agent_type: String,
}

/// A JSON post feed polled over HTTP
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

/// Discovery configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    /// Chat mentions needed before a type counts as trending
    pub trend_threshold: u64,

    /// Token volume above which a listing becomes an opportunity
    pub token_volume_threshold: u64,

    /// Timeout for HTTP feed requests
    pub request_timeout_secs: u64,

    /// Posts served by the `posts` source
    pub posts: Vec<PostConfig>,

    /// Listings served by the `tokens` source
    pub tokens: Vec<TokenConfig>,

    /// HTTP feeds, one source each
    pub feeds: Vec<FeedConfig>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            trend_threshold: 5,
            token_volume_threshold: 10_000,
            request_timeout_secs: 10,
            posts: vec![
                PostConfig {
                    text: "We really need a gaming agent for tournaments".to_string(),
                    mentions: 15,
                },
                PostConfig {
                    text: "Someone should build a meme agent".to_string(),
                    mentions: 8,
                },
            ],
            tokens: vec![TokenConfig {
                name: "TraderBot".to_string(),
                volume: 50_000,
                agent_type: "trader".to_string(),
            }],
            feeds: Vec::new(),
        }
    }
}

/// Agent factory configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FactoryConfig {
    /// Amount sent to every new agent wallet
    pub seed_amount: Decimal,

    /// Directory holding execution templates
    pub templates_dir: String,

    /// Directory receiving cloned agent instances
    pub agents_dir: String,

    /// Template used for unrecognised agent types
    pub default_template: String,

    /// Agent type to template file name
    pub templates: HashMap<String, String>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        let templates = [
            ("meme", "meme_agent.py"),
            ("trader", "trader_agent.py"),
            ("social", "social_agent.py"),
            ("gaming", "meme_agent.py"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            seed_amount: dec!(0.1),
            templates_dir: "./templates".to_string(),
            agents_dir: "./agents".to_string(),
            default_template: "meme_agent.py".to_string(),
            templates,
        }
    }
}

/// Treasury configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TreasuryConfig {
    /// Balance below which an agent gets topped up
    pub min_balance: Decimal,

    /// Amount sent when topping up
    pub refund_amount: Decimal,

    /// Share of an agent balance collected as revenue
    pub fee_rate: Decimal,

    /// Fees at or below this are not collected
    pub dust_threshold: Decimal,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            min_balance: dec!(0.05),
            refund_amount: dec!(0.1),
            fee_rate: dec!(0.1),
            dust_threshold: dec!(0.01),
        }
    }
}

/// Registry snapshot configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Save and restore the agent registry
    pub enabled: bool,

    /// Directory for the registry snapshot
    pub data_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: "./data".to_string(),
        }
    }
}

fn default_mentions() -> u64 {
    1
}

impl Config {
    /// Load configuration from a TOML file, layered with `MOLTI__*` environment overrides.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file without environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = toml::from_str(&config_text)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Reject values the supervisor cannot run with
    pub fn validate(&self) -> Result<()> {
        use crate::core::error::MoltiError;

        if self.supervisor.score_threshold > 10 {
            return Err(MoltiError::ConfigError(format!(
                "score_threshold must be within 0..=10, got {}",
                self.supervisor.score_threshold
            ))
            .into());
        }
        if self.supervisor.event_capacity == 0 {
            return Err(
                MoltiError::ConfigError("event_capacity must be positive".to_string()).into(),
            );
        }
        if self.treasury.fee_rate < Decimal::ZERO || self.treasury.fee_rate > Decimal::ONE {
            return Err(MoltiError::ConfigError(format!(
                "fee_rate must be within 0..=1, got {}",
                self.treasury.fee_rate
            ))
            .into());
        }
        if self.factory.seed_amount < Decimal::ZERO || self.treasury.refund_amount < Decimal::ZERO
        {
            return Err(
                MoltiError::ConfigError("transfer amounts must not be negative".to_string())
                    .into(),
            );
        }
        Ok(())
    }

    /// Create a new config with default values for testing
    #[cfg(test)]
    pub fn for_testing(data_dir: &Path) -> Self {
        let mut config = Config::default();
        config.supervisor.scan_interval_secs = 0;
        config.supervisor.error_backoff_secs = 0;
        config.persistence.data_dir = data_dir.join("data").to_string_lossy().into_owned();
        config.factory.templates_dir = data_dir.join("templates").to_string_lossy().into_owned();
        config.factory.agents_dir = data_dir.join("agents").to_string_lossy().into_owned();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_documented_thresholds() {
        let config = Config::default();
        assert_eq!(config.supervisor.scan_interval_secs, 300);
        assert_eq!(config.supervisor.error_backoff_secs, 60);
        assert_eq!(config.supervisor.score_threshold, 7);
        assert_eq!(config.scanner.trend_threshold, 5);
        assert_eq!(config.treasury.min_balance, dec!(0.05));
        assert_eq!(config.treasury.refund_amount, dec!(0.1));
        assert_eq!(config.factory.seed_amount, dec!(0.1));
        assert_eq!(
            config.factory.templates.get("gaming").map(String::as_str),
            Some("meme_agent.py")
        );
    }

    #[test]
    fn test_toml_round_trip_preserves_amounts() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.treasury.dust_threshold, dec!(0.01));
        assert_eq!(parsed.scanner.posts.len(), 2);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("molti.toml");
        std::fs::write(
            &path,
            r#"
[supervisor]
scan_interval_secs = 30

[treasury]
min_balance = "0.2"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.supervisor.scan_interval_secs, 30);
        assert_eq!(config.supervisor.error_backoff_secs, 60);
        assert_eq!(config.treasury.min_balance, dec!(0.2));
        assert_eq!(config.treasury.refund_amount, dec!(0.1));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.supervisor.score_threshold, 7);
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.supervisor.score_threshold = 11;
        assert!(config.validate().is_err());
    }
}
