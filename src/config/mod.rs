//! Layered configuration for builder jobs.
//!
//! Configuration is loaded with precedence: CLI args > Env vars > Config file > Defaults
//!
//! # Example config file (spgbuild.toml)
//! ```toml
//! project_id = 7
//! job_name = "person-import"
//! operation = "upsert"
//! batch_size = 500
//! parallelism = 4
//! graph_store_url = "memory://graph"
//! search_engine_url = "memory://search"
//! ```

mod defaults;
mod job;

pub use defaults::*;
pub use job::*;

use crate::error::BuilderError;
use crate::model::RecordAlterOperation;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Job-wide settings every stage reads during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub project_id: i64,
    pub job_name: String,
    /// Upsert or delete; decides whether the sink runs its check stage
    pub operation: RecordAlterOperation,
    pub batch_size: usize,
    pub parallelism: usize,
    pub graph_store_url: String,
    pub search_engine_url: String,
    /// Run causal reasoning after taxonomy reasoning
    pub enable_lead_to: bool,
    pub search_top_k: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID,
            job_name: DEFAULT_JOB_NAME.to_string(),
            operation: RecordAlterOperation::Upsert,
            batch_size: DEFAULT_BATCH_SIZE,
            parallelism: default_parallelism(),
            graph_store_url: DEFAULT_GRAPH_STORE_URL.to_string(),
            search_engine_url: DEFAULT_SEARCH_ENGINE_URL.to_string(),
            enable_lead_to: DEFAULT_ENABLE_LEAD_TO,
            search_top_k: DEFAULT_SEARCH_TOP_K,
        }
    }
}

impl BuilderConfig {
    /// Load configuration with precedence: CLI args > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - CLI overrides to apply on top
    pub fn load(
        config_path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<Self, BuilderError> {
        let mut figment = Figment::new().merge(Serialized::defaults(BuilderConfig::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("SPGBUILD_"));
        figment = figment.merge(Serialized::defaults(overrides));

        let config: BuilderConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment and optional config file only (no CLI overrides)
    pub fn from_env(config_path: Option<&str>) -> Result<Self, BuilderError> {
        Self::load(config_path, ConfigOverrides::default())
    }

    pub fn validate(&self) -> Result<(), BuilderError> {
        if self.batch_size == 0 {
            return Err(BuilderError::config("batch_size must be positive"));
        }
        if self.parallelism == 0 {
            return Err(BuilderError::config("parallelism must be positive"));
        }
        if self.search_top_k == 0 {
            return Err(BuilderError::config("search_top_k must be positive"));
        }
        Ok(())
    }
}

/// CLI overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<RecordAlterOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_store_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_engine_url: Option<String>,
}
