use anyhow::{Context, Result};
use log::info;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use super::child::ChildAgent;
use super::registry::AgentRegistry;

/// Persists the agent registry to disk and loads it back.
///
/// Key material is skipped during serialization, so restored agents carry no signer.
pub struct PersistenceManager {
    /// The directory where registry data will be stored
    data_dir: PathBuf,

    /// The filename for the registry snapshot
    agents_filename: String,
}

impl PersistenceManager {
    /// Create a new persistence manager
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        // Create the data directory if it doesn't exist
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        Ok(Self {
            data_dir,
            agents_filename: "agents.json".to_string(),
        })
    }

    /// Get the full path to the registry snapshot
    pub fn agents_file_path(&self) -> PathBuf {
        self.data_dir.join(&self.agents_filename)
    }

    /// Save every registered agent
    pub fn save_registry(&self, registry: &AgentRegistry) -> Result<()> {
        let agents: Vec<&ChildAgent> = registry.iter().collect();
        self.save_agents(&agents)
    }

    /// Save agents to disk through a temp file and rename
    pub fn save_agents(&self, agents: &[&ChildAgent]) -> Result<()> {
        let file_path = self.agents_file_path();

        // Ensure the data directory exists before writing
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;

        // Write to a temporary file first
        let temp_path = file_path.with_extension("tmp");
        let file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temporary registry file: {:?}", temp_path))?;
        let writer = BufWriter::new(file);

        // Serialize agents to JSON; key material is skipped by serde
        serde_json::to_writer_pretty(writer, agents)
            .with_context(|| "Failed to serialize agents to JSON")?;

        // Atomically replace the previous snapshot
        fs::rename(&temp_path, &file_path)
            .with_context(|| format!("Failed to rename temporary file to {:?}", file_path))?;

        info!("Saved {} agents to {:?}", agents.len(), file_path);
        Ok(())
    }

    /// Load agents from disk; a missing snapshot yields an empty list
    pub fn load_agents(&self) -> Result<Vec<ChildAgent>> {
        let file_path = self.agents_file_path();

        // A missing snapshot means a fresh start
        if !file_path.exists() {
            info!("No registry snapshot at {:?}, starting empty", file_path);
            return Ok(Vec::new());
        }

        // Open a buffered reader for the file
        let file = File::open(&file_path)
            .with_context(|| format!("Failed to open registry snapshot: {:?}", file_path))?;
        let reader = BufReader::new(file);

        let agents: Vec<ChildAgent> = serde_json::from_reader(reader)
            .with_context(|| "Failed to deserialize agents from JSON")?;

        info!("Loaded {} agents from {:?}", agents.len(), file_path);
        Ok(agents)
    }
}
