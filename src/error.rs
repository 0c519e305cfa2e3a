//! # Error Module
//!
//! Error taxonomy for the builder pipeline. Record-level and fusing errors fail a
//! single record; schema, driver and configuration errors are fatal for the job;
//! backend write errors fail the batch write they belong to.

use thiserror::Error;

/// Result type alias using [`BuilderError`].
pub type Result<T> = std::result::Result<T, BuilderError>;

/// A fusing strategy failed. Sub-entities may already have been linked when this
/// is raised, so it is kept apart from plain data errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fusing failed for {spg_type}: {message}")]
pub struct FusingError {
    pub spg_type: String,
    pub message: String,
}

impl FusingError {
    pub fn new(spg_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            spg_type: spg_type.into(),
            message: message.into(),
        }
    }
}

/// One backend's failure inside a dual write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{backend}: {message}")]
pub struct BackendFailure {
    pub backend: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("record error: {0}")]
    Record(String),
    #[error(transparent)]
    Fusing(#[from] FusingError),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("cannot find driver for {0}")]
    DriverNotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("reasoning error: {0}")]
    Reasoning(String),
    #[error("backend write failed: {}", join_failures(.0))]
    BackendWrite(Vec<BackendFailure>),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl BuilderError {
    pub fn record(message: impl Into<String>) -> Self {
        Self::Record(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Fatal errors indicate a misconfigured pipeline or an inconsistent schema
    /// and must abort the job instead of the current record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Schema(_) | Self::DriverNotFound(_) | Self::Config(_)
        )
    }

    /// Errors confined to a single record; sibling records keep going.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::Record(_) | Self::Fusing(_) | Self::Reasoning(_))
    }
}

impl From<figment::Error> for BuilderError {
    fn from(e: figment::Error) -> Self {
        Self::Config(e.to_string())
    }
}
