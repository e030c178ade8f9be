use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::time::Duration;

use super::types::Signal;
use crate::core::config::{PostConfig, TokenConfig};
use crate::core::error::MoltiError;

/// A pull-based discovery source with snapshot semantics
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Name used as the opportunity source tag
    fn name(&self) -> String;

    /// Take one snapshot of the source
    async fn scan(&self) -> Result<Vec<Signal>>;
}

/// Serves a fixed list of posts
pub struct StaticPostSource {
    name: String,
    posts: Vec<PostConfig>,
}

impl StaticPostSource {
    pub fn new(name: impl Into<String>, posts: Vec<PostConfig>) -> Self {
        Self {
            name: name.into(),
            posts,
        }
    }
}

#[async_trait]
impl DiscoverySource for StaticPostSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn scan(&self) -> Result<Vec<Signal>> {
        Ok(self
            .posts
            .iter()
            .map(|post| Signal::text(&self.name, &post.text, post.mentions))
            .collect())
    }
}

/// Serves a fixed list of agent token listings
pub struct TokenVolumeSource {
    name: String,
    tokens: Vec<TokenConfig>,
}

impl TokenVolumeSource {
    pub fn new(name: impl Into<String>, tokens: Vec<TokenConfig>) -> Self {
        Self {
            name: name.into(),
            tokens,
        }
    }
}

#[async_trait]
impl DiscoverySource for TokenVolumeSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn scan(&self) -> Result<Vec<Signal>> {
        Ok(self
            .tokens
            .iter()
            .map(|t| Signal::token(&self.name, &t.name, t.volume, &t.agent_type))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct FeedPost {
    text: String,
    #[serde(default = "one")]
    mentions: u64,
}

fn one() -> u64 {
    1
}

/// Polls a JSON feed returning `[{"text": "...", "mentions": n}, ...]`
pub struct HttpPostSource {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpPostSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            name: name.into(),
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl DiscoverySource for HttpPostSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn scan(&self) -> Result<Vec<Signal>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MoltiError::SourceUnavailable {
                source_name: self.name.clone(),
                message: format!("HTTP {} from {}", status.as_u16(), self.url),
            }
            .into());
        }

        let posts: Vec<FeedPost> = response
            .json()
            .await
            .with_context(|| format!("Malformed feed body from {}", self.url))?;
        debug!("Feed '{}' returned {} posts", self.name, posts.len());

        Ok(posts
            .into_iter()
            .map(|p| Signal::text(&self.name, p.text, p.mentions))
            .collect())
    }
}
