use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::config::FactoryConfig;

/// A resolved execution template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateHandle {
    /// Template file name, e.g. `trader_agent.py`
    pub name: String,
    pub path: PathBuf,
}

/// A template instantiated for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceHandle {
    pub path: PathBuf,

    /// False when the template was missing and a placeholder was written
    pub from_template: bool,
}

impl InstanceHandle {
    pub fn display(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Template store interface
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Find the template for an agent type, falling back to the default
    fn resolve(&self, agent_type: &str) -> Result<TemplateHandle>;

    /// Instantiate a template under a destination id
    async fn clone_template(&self, handle: &TemplateHandle, dest_id: &str)
        -> Result<InstanceHandle>;
}

/// Templates on disk, instantiated by copying into an agents directory
pub struct FsTemplateStore {
    templates_dir: PathBuf,
    agents_dir: PathBuf,
    mapping: HashMap<String, String>,
    default_template: String,
}

impl FsTemplateStore {
    pub fn new(
        templates_dir: impl AsRef<Path>,
        agents_dir: impl AsRef<Path>,
        mapping: HashMap<String, String>,
        default_template: impl Into<String>,
    ) -> Self {
        Self {
            templates_dir: templates_dir.as_ref().to_path_buf(),
            agents_dir: agents_dir.as_ref().to_path_buf(),
            mapping,
            default_template: default_template.into(),
        }
    }

    pub fn from_config(config: &FactoryConfig) -> Self {
        Self::new(
            &config.templates_dir,
            &config.agents_dir,
            config.templates.clone(),
            config.default_template.clone(),
        )
    }

    fn placeholder(dest_id: &str, template: &TemplateHandle) -> String {
        format!(
            "# {id}\n# Template: {template}\n\nprint(\"Agent {id} running...\")\n",
            id = dest_id,
            template = template.name
        )
    }
}

#[async_trait]
impl TemplateStore for FsTemplateStore {
    fn resolve(&self, agent_type: &str) -> Result<TemplateHandle> {
        let name = self
            .mapping
            .get(agent_type)
            .cloned()
            .unwrap_or_else(|| {
                debug!(
                    "No template for '{}', using {}",
                    agent_type, self.default_template
                );
                self.default_template.clone()
            });

        Ok(TemplateHandle {
            path: self.templates_dir.join(&name),
            name,
        })
    }

    async fn clone_template(
        &self,
        handle: &TemplateHandle,
        dest_id: &str,
    ) -> Result<InstanceHandle> {
        tokio::fs::create_dir_all(&self.agents_dir)
            .await
            .with_context(|| format!("Failed to create agents directory: {:?}", self.agents_dir))?;

        let extension = handle
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "py".to_string());
        let dest = self.agents_dir.join(format!("{}.{}", dest_id, extension));

        let from_template = tokio::fs::try_exists(&handle.path).await.unwrap_or(false);
        if from_template {
            tokio::fs::copy(&handle.path, &dest)
                .await
                .with_context(|| format!("Failed to copy {:?} to {:?}", handle.path, dest))?;
        } else {
            tokio::fs::write(&dest, Self::placeholder(dest_id, handle))
                .await
                .with_context(|| format!("Failed to write placeholder {:?}", dest))?;
        }

        info!("Cloned template {} to {:?}", handle.name, dest);
        Ok(InstanceHandle {
            path: dest,
            from_template,
        })
    }
}
