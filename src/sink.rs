//! # Sink Module
//!
//! Final stage of a job: consistency check (upserts only), spreadability
//! rewrite, then one batch command to the graph store followed by the same
//! command to the search engine. The two writes are independent; a failure on
//! one backend does not undo the other.

use crate::context::BuilderContext;
use crate::driver::{GraphStoreClient, SearchEngineClient};
use crate::error::{BackendFailure, BuilderError, Result};
use crate::mapping::not_initialized;
use crate::model::{RecordAlterOperation, SpgRecord, SpgRecordManipulateCmd};
use crate::schema::{Catalog, SpgTypeRef};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pre-write consistency check. Its output replaces the batch.
pub trait CheckProcessor: Send + Sync {
    fn check(&self, records: Vec<SpgRecord>) -> Result<Vec<SpgRecord>>;
}

/// Drops records without an id and properties without a value.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaCheckProcessor;

impl CheckProcessor for SchemaCheckProcessor {
    fn check(&self, records: Vec<SpgRecord>) -> Result<Vec<SpgRecord>> {
        let before = records.len();
        let checked: Vec<SpgRecord> = records
            .into_iter()
            .filter(|record| match record {
                SpgRecord::Advanced(advanced) => !advanced.id.trim().is_empty(),
                SpgRecord::Relation(relation) => {
                    !relation.src_id.trim().is_empty() && !relation.dst_id.trim().is_empty()
                }
            })
            .map(|mut record| {
                record
                    .properties_mut()
                    .retain(|p| !p.value.raw.trim().is_empty() || p.value.is_standardized());
                record
            })
            .collect();
        if checked.len() < before {
            debug!(dropped = before - checked.len(), "check dropped records");
        }
        Ok(checked)
    }
}

/// Sink contract: initialized once, then written to from any worker.
pub trait SinkWriter: Send + Sync {
    fn init(&mut self, context: &BuilderContext) -> Result<()>;

    /// Write one batch, returning the number of records sent.
    fn write(&self, records: Vec<SpgRecord>) -> Result<usize>;

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Point semantic properties at non-spreadable standard types to plain text.
pub fn rewrite_spreadable(records: &mut [SpgRecord], catalog: &dyn Catalog) {
    for record in records.iter_mut() {
        let SpgRecord::Advanced(advanced) = record else {
            continue;
        };
        for property in &mut advanced.properties {
            let object_type = property.object_type_ref();
            if property.is_semantic()
                && object_type.is_standard()
                && !catalog.is_spreadable(&object_type.identifier)
            {
                property.property.object_type = SpgTypeRef::text();
            }
        }
    }
}

struct SinkState {
    operation: RecordAlterOperation,
    catalog: Arc<dyn Catalog>,
    graph_store: Arc<dyn GraphStoreClient>,
    search_engine: Arc<dyn SearchEngineClient>,
}

/// Writes to the graph store and search engine resolved from the context URLs.
pub struct GraphStoreSinkWriter {
    check: Arc<dyn CheckProcessor>,
    state: Option<SinkState>,
}

impl Default for GraphStoreSinkWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStoreSinkWriter {
    pub fn new() -> Self {
        Self {
            check: Arc::new(SchemaCheckProcessor),
            state: None,
        }
    }

    pub fn with_check_processor(mut self, check: Arc<dyn CheckProcessor>) -> Self {
        self.check = check;
        self
    }
}

impl SinkWriter for GraphStoreSinkWriter {
    fn init(&mut self, context: &BuilderContext) -> Result<()> {
        self.state = Some(SinkState {
            operation: context.operation(),
            catalog: Arc::clone(context.catalog()),
            graph_store: context.graph_store_client()?,
            search_engine: context.search_engine_client()?,
        });
        debug!(
            graph_store = %context.config().graph_store_url,
            search_engine = %context.config().search_engine_url,
            "sink initialized"
        );
        Ok(())
    }

    fn write(&self, records: Vec<SpgRecord>) -> Result<usize> {
        let state = self.state.as_ref().ok_or_else(|| not_initialized("graph-store-sink"))?;
        let mut records = match state.operation {
            RecordAlterOperation::Upsert => self.check.check(records)?,
            RecordAlterOperation::Delete => records,
        };
        if records.is_empty() {
            return Ok(0);
        }
        rewrite_spreadable(&mut records, state.catalog.as_ref());

        let cmd = SpgRecordManipulateCmd::new(state.operation, &records);
        let mut failures = Vec::new();
        if let Err(e) = state.graph_store.manipulate_record(&cmd) {
            warn!(error = %e, records = cmd.items.len(), "graph store write failed");
            failures.push(BackendFailure {
                backend: "graph_store",
                message: e.to_string(),
            });
        }
        if let Err(e) = state.search_engine.manipulate_record(&cmd) {
            warn!(error = %e, records = cmd.items.len(), "search engine write failed");
            failures.push(BackendFailure {
                backend: "search_engine",
                message: e.to_string(),
            });
        }
        if !failures.is_empty() {
            return Err(BuilderError::BackendWrite(failures));
        }
        Ok(cmd.items.len())
    }
}
