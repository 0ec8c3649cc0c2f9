use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub stores: StoresConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Connection settings for the two backing stores.
///
/// The graph password is never written to the config file; it is read from
/// the `NEO4J_PASSWORD` environment variable at connect time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoresConfig {
    pub graph_uri: String,
    pub graph_user: String,
    pub vector_url: String,
    pub collection: String,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            graph_uri: "bolt://127.0.0.1:7687".to_string(),
            graph_user: "neo4j".to_string(),
            vector_url: "http://127.0.0.1:6334".to_string(),
            collection: "manual_chunks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Target chunk window in estimated tokens
    pub chunk_size: usize,
    /// Overlap between consecutive chunks of a page, in estimated tokens
    pub chunk_overlap: usize,
    /// Bound on concurrently processed URLs (0 = number of CPUs)
    pub workers: usize,
    /// Download attempts before a URL is marked permanently failed
    pub fetch_attempts: u32,
    /// Per-download timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Bound on texts per embedding invocation
    pub embed_batch_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            workers: 0,
            fetch_attempts: 3,
            fetch_timeout_secs: 30,
            embed_batch_size: 16,
        }
    }
}

impl IngestionConfig {
    /// Effective worker bound (resolves 0 to the CPU count)
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest neighbors requested from the vector store
    pub top_k: usize,
    /// Maximum similarity distance for a chunk to be retained
    pub max_distance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            max_distance: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(&config_path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".partscout").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.ingestion.chunk_size, 800);
        assert_eq!(config.ingestion.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.max_distance, 1.5);
        assert_eq!(config.stores.collection, "manual_chunks");
    }

    #[test]
    fn test_effective_workers_nonzero() {
        let mut ingestion = IngestionConfig::default();
        assert!(ingestion.effective_workers() >= 1);

        ingestion.workers = 4;
        assert_eq!(ingestion.effective_workers(), 4);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.retrieval.top_k = 5;
        config.stores.graph_uri = "bolt://db:7687".to_string();

        let toml_string = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized.retrieval.top_k, 5);
        assert_eq!(deserialized.stores.graph_uri, "bolt://db:7687");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[retrieval]\ntop_k = 3\nmax_distance = 0.9\n").unwrap();
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.ingestion.chunk_size, 800);
    }
}
