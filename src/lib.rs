//! # Spgbuild
//!
//! Schema-aware knowledge-graph builder. Raw tabular records are mapped onto
//! the types of a semantic schema, their property values are linked to
//! existing graph entities, gaps are predicted, related sub-entities are fused
//! into a sub-graph, concepts are reasoned over with an external rule engine,
//! and the result is written to a graph store and a search engine.

pub mod config;
pub mod context;
pub mod convert;
pub mod driver;
pub mod error;
pub mod index;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod reason;
pub mod schema;
pub mod sink;
pub mod store;
pub mod strategy;

#[doc(hidden)]
pub mod test_support;

// Re-export main types for convenience
pub use config::{BuilderConfig, ConfigOverrides, JobConfig};
pub use context::BuilderContext;
pub use driver::{Drivers, GraphStoreClient, SearchEngineClient};
pub use error::{BuilderError, Result};
pub use mapping::{MappingConfig, MappingNodeConfig, MappingType, Processor};
pub use model::{AdvancedRecord, BaseRecord, BuilderRecord, RelationRecord, SpgRecord};
pub use pipeline::{BuilderPipeline, PipelineReport};
pub use reason::{GraphState, ReasonProcessor, RuleEvaluator};
pub use schema::{Catalog, InMemoryCatalog, ProjectSchema};
pub use sink::{GraphStoreSinkWriter, SinkWriter};
