//! Job definition: the mapping nodes a pipeline runs, in order.

use crate::error::BuilderError;
use crate::mapping::MappingNodeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Mapping nodes; every input record is offered to each node in order.
    pub nodes: Vec<MappingNodeConfig>,
    /// Attach the concept reasoner after mapping.
    pub reasoning: bool,
}

impl JobConfig {
    pub fn from_json(raw: &str) -> Result<Self, BuilderError> {
        let job: JobConfig = serde_json::from_str(raw)?;
        if job.nodes.is_empty() {
            return Err(BuilderError::config("job defines no mapping nodes"));
        }
        Ok(job)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BuilderError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingType;
    use std::io::Write;

    #[test]
    fn test_job_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{"nodes": [{{"identifier": "Demo.Person",
                "mappings": [{{"source": "city", "predicate": "livesIn"}}]}}]}}"#
        )?;
        let job = JobConfig::from_file(file.path())?;
        assert_eq!(job.nodes.len(), 1);
        assert!(!job.reasoning);
        assert_eq!(job.nodes[0].mappings[0].mapping_type, MappingType::Property);
        Ok(())
    }

    #[test]
    fn test_empty_job_rejected() {
        let err = JobConfig::from_json(r#"{"nodes": []}"#).unwrap_err();
        assert!(err.is_fatal());
    }
}
