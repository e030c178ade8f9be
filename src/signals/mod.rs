//! Discovery: sources, opportunity extraction and chat trends.

pub mod aggregator;
pub mod chat;
pub mod extractor;
pub mod sources;
pub mod trends;
pub mod types;

pub use aggregator::{ScanReport, SignalAggregator, TREND_SOURCE};
pub use chat::ChatListener;
pub use extractor::extract_opportunity;
pub use sources::{DiscoverySource, HttpPostSource, StaticPostSource, TokenVolumeSource};
pub use trends::KeywordCounter;
pub use types::{Opportunity, Signal, SignalPayload};
