use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::chat::ChatListener;
use super::extractor::extract_opportunity;
use super::sources::DiscoverySource;
use super::trends::KeywordCounter;
use super::types::{Opportunity, Signal, SignalPayload};
use crate::core::config::ScannerConfig;
use crate::core::error::MoltiError;

/// Source tag for opportunities synthesised from chat trends
pub const TREND_SOURCE: &str = "trends";

/// Result of one scan pass
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Opportunities in source order, trends last
    pub opportunities: Vec<Opportunity>,

    /// One entry per source that failed during the pass
    pub failures: Vec<MoltiError>,
}

/// Fans out to every discovery source and folds in chat trends
pub struct SignalAggregator {
    sources: Vec<Arc<dyn DiscoverySource>>,
    counter: Arc<KeywordCounter>,
    trend_threshold: u64,
    token_volume_threshold: u64,
}

impl SignalAggregator {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            sources: Vec::new(),
            counter: Arc::new(KeywordCounter::new()),
            trend_threshold: config.trend_threshold,
            token_volume_threshold: config.token_volume_threshold,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn DiscoverySource>) -> Self {
        self.add_source(source);
        self
    }

    pub fn add_source(&mut self, source: Arc<dyn DiscoverySource>) {
        info!("Registered discovery source '{}'", source.name());
        self.sources.push(source);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Shared trend counter
    pub fn counter(&self) -> Arc<KeywordCounter> {
        Arc::clone(&self.counter)
    }

    /// Create a listener feeding this aggregator's trend counter, plus the
    /// sender a live chat adapter pushes raw messages into
    pub fn chat_channel(&self, capacity: usize) -> (mpsc::Sender<String>, ChatListener) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, ChatListener::new(rx, self.counter()))
    }

    /// Count a live message towards trends
    pub fn analyze_message(&self, text: &str) -> Option<String> {
        super::chat::record_message(&self.counter, text)
    }

    /// One pass over every source, followed by the trend pass
    pub async fn scan(&self) -> Vec<Opportunity> {
        self.scan_report().await.opportunities
    }

    /// Like [`scan`](Self::scan) but also reports which sources failed
    pub async fn scan_report(&self) -> ScanReport {
        let results = join_all(self.sources.iter().map(|s| s.scan())).await;

        let mut report = ScanReport::default();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(signals) => {
                    let before = report.opportunities.len();
                    report.opportunities.extend(
                        signals
                            .iter()
                            .filter_map(|signal| self.opportunity_from_signal(signal)),
                    );
                    debug!(
                        "Source '{}' yielded {} signals, {} opportunities",
                        source.name(),
                        signals.len(),
                        report.opportunities.len() - before
                    );
                }
                Err(e) => {
                    let failure = MoltiError::SourceUnavailable {
                        source_name: source.name(),
                        message: format!("{:#}", e),
                    };
                    warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        report.opportunities.extend(self.analyze_trends());
        report
    }

    /// Emit one trending opportunity per type at or above the threshold, then
    /// reset every count
    pub fn analyze_trends(&self) -> Vec<Opportunity> {
        let mut counts: Vec<(String, u64)> = self.counter.take().into_iter().collect();
        counts.sort();

        counts
            .into_iter()
            .filter(|(_, count)| *count >= self.trend_threshold)
            .map(|(agent_type, count)| {
                let description = format!("Trending: {} agent ({} mentions)", agent_type, count);
                Opportunity::new(agent_type, description, TREND_SOURCE)
                    .with_mentions(count)
                    .trending()
            })
            .collect()
    }

    fn opportunity_from_signal(&self, signal: &Signal) -> Option<Opportunity> {
        match &signal.payload {
            SignalPayload::Text { text, mentions } => {
                extract_opportunity(text, &signal.source).map(|opp| opp.with_mentions(*mentions))
            }
            SignalPayload::Token {
                volume, agent_type, ..
            } => {
                if *volume <= self.token_volume_threshold {
                    return None;
                }
                let description = format!("High volume {} agent detected", agent_type);
                Some(
                    Opportunity::new(agent_type.to_lowercase(), description, &signal.source)
                        .with_mentions(volume / 1000)
                        .trending(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{PostConfig, TokenConfig};
    use crate::signals::sources::{MockDiscoverySource, StaticPostSource, TokenVolumeSource};

    fn failing_source(name: &'static str) -> Arc<dyn DiscoverySource> {
        let mut source = MockDiscoverySource::new();
        source.expect_name().return_const(name.to_string());
        source
            .expect_scan()
            .returning(|| Err(anyhow::anyhow!("connection refused")));
        Arc::new(source)
    }

    #[tokio::test]
    async fn test_failing_source_does_not_suppress_others() {
        let config = ScannerConfig::default();
        let aggregator = SignalAggregator::new(&config)
            .with_source(failing_source("broken"))
            .with_source(Arc::new(StaticPostSource::new(
                "posts",
                config.posts.clone(),
            )));

        let report = aggregator.scan_report().await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind(), "source_unavailable");

        let types: Vec<&str> = report
            .opportunities
            .iter()
            .map(|o| o.agent_type.as_str())
            .collect();
        assert_eq!(types, vec!["gaming", "meme"]);
        assert_eq!(report.opportunities[0].mentions, 15);
        assert_eq!(report.opportunities[0].source, "posts");
    }

    #[tokio::test]
    async fn test_token_volume_threshold() {
        let config = ScannerConfig::default();
        let tokens = vec![
            TokenConfig {
                name: "TraderBot".to_string(),
                volume: 50_000,
                agent_type: "trader".to_string(),
            },
            TokenConfig {
                name: "Tiny".to_string(),
                volume: 10_000,
                agent_type: "tiny".to_string(),
            },
        ];
        let aggregator = SignalAggregator::new(&config)
            .with_source(Arc::new(TokenVolumeSource::new("tokens", tokens)));

        let opportunities = aggregator.scan().await;
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].agent_type, "trader");
        assert_eq!(opportunities[0].mentions, 50);
        assert!(opportunities[0].trending);
        assert_eq!(
            opportunities[0].description,
            "High volume trader agent detected"
        );
    }

    #[test]
    fn test_five_mentions_make_one_trend() {
        let aggregator = SignalAggregator::new(&ScannerConfig::default());
        for _ in 0..5 {
            aggregator.analyze_message("this meme agent is great");
        }

        let trends = aggregator.analyze_trends();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].agent_type, "meme");
        assert_eq!(trends[0].mentions, 5);
        assert!(trends[0].trending);
        assert_eq!(trends[0].source, TREND_SOURCE);

        assert!(aggregator.counter().is_empty());
        assert!(aggregator.analyze_trends().is_empty());
    }

    #[test]
    fn test_below_threshold_counts_are_discarded() {
        let aggregator = SignalAggregator::new(&ScannerConfig::default());
        for _ in 0..4 {
            aggregator.analyze_message("need a social agent");
        }
        assert!(aggregator.analyze_trends().is_empty());
        assert!(aggregator.counter().is_empty());
    }

    #[tokio::test]
    async fn test_scan_appends_trends_after_sources() {
        let config = ScannerConfig::default();
        let aggregator = SignalAggregator::new(&config).with_source(Arc::new(
            StaticPostSource::new(
                "posts",
                vec![PostConfig {
                    text: "need a trader agent".to_string(),
                    mentions: 1,
                }],
            ),
        ));
        for _ in 0..6 {
            aggregator.analyze_message("gaming agent when?");
        }

        let opportunities = aggregator.scan().await;
        assert_eq!(opportunities.len(), 2);
        assert_eq!(opportunities[0].agent_type, "trader");
        assert_eq!(opportunities[1].agent_type, "gaming");
        assert_eq!(opportunities[1].mentions, 6);
    }
}
