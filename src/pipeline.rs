//! # Pipeline Module
//!
//! Batch-parallel job runner. Input records are cut into batches of
//! `batch_size`; a rayon pool of `parallelism` workers runs each batch through
//! the whole chain:
//!
//! ```text
//! raw records ─► mapping nodes ─► concept reasoner (optional) ─► sink
//! ```
//!
//! Every stage is initialized once, before the first batch. Inside a batch
//! records keep input order; batches themselves complete in any order.

use crate::config::JobConfig;
use crate::context::BuilderContext;
use crate::error::{BuilderError, Result};
use crate::mapping::{build_mapping_processor, Processor, RecordBatch, RecordFailure};
use crate::model::BaseRecord;
use crate::reason::ReasonProcessor;
use crate::sink::{GraphStoreSinkWriter, SinkWriter};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A batch whose write failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWriteFailure {
    pub batch: usize,
    pub records: usize,
    pub message: String,
}

/// Outcome of a job run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub batches: usize,
    pub records_in: usize,
    pub records_written: usize,
    pub failures: Vec<RecordFailure>,
    pub write_failures: Vec<BatchWriteFailure>,
}

impl PipelineReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.write_failures.is_empty()
    }

    fn absorb(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        self.records_in += outcome.records_in;
        self.records_written += outcome.records_written;
        self.failures.extend(outcome.failures);
        self.write_failures.extend(outcome.write_failure);
    }
}

struct BatchOutcome {
    records_in: usize,
    records_written: usize,
    failures: Vec<RecordFailure>,
    write_failure: Option<BatchWriteFailure>,
}

pub struct BuilderPipeline {
    context: Arc<BuilderContext>,
    mappers: Vec<Box<dyn Processor>>,
    reasoner: Option<ReasonProcessor>,
    sink: Box<dyn SinkWriter>,
    pool: rayon::ThreadPool,
}

impl BuilderPipeline {
    /// Build and initialize every stage of `job`, writing through the
    /// default graph-store sink.
    pub fn build(context: Arc<BuilderContext>, job: &JobConfig) -> Result<Self> {
        Self::build_with_sink(context, job, Box::new(GraphStoreSinkWriter::new()))
    }

    pub fn build_with_sink(
        context: Arc<BuilderContext>,
        job: &JobConfig,
        mut sink: Box<dyn SinkWriter>,
    ) -> Result<Self> {
        context.config().validate()?;
        let mut mappers = Vec::with_capacity(job.nodes.len());
        for node in &job.nodes {
            let mut processor = build_mapping_processor(node.clone())?;
            processor.init(&context)?;
            mappers.push(processor);
        }

        let reasoner = if job.reasoning {
            let mut reasoner = ReasonProcessor::new();
            reasoner.init(&context)?;
            Some(reasoner)
        } else {
            None
        };

        sink.init(&context)?;

        let parallelism = context.config().parallelism;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("spgbuild-worker-{i}"))
            .build()
            .map_err(|e| BuilderError::config(format!("cannot start worker pool: {e}")))?;

        info!(
            job = %context.config().job_name,
            nodes = mappers.len(),
            reasoning = reasoner.is_some(),
            parallelism,
            "pipeline initialized"
        );
        Ok(Self {
            context,
            mappers,
            reasoner,
            sink,
            pool,
        })
    }

    pub fn context(&self) -> &Arc<BuilderContext> {
        &self.context
    }

    /// Run every record through the chain and collect the report.
    #[instrument(skip(self, records), fields(job = %self.context.config().job_name), level = "debug")]
    pub fn run(&self, records: Vec<BaseRecord>) -> PipelineReport {
        let batch_size = self.context.config().batch_size;
        let mut batches: Vec<Vec<BaseRecord>> = Vec::new();
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            batches.push(records.by_ref().take(batch_size).collect());
        }

        let outcomes: Vec<BatchOutcome> = self.pool.install(|| {
            batches
                .into_par_iter()
                .enumerate()
                .map(|(index, batch)| self.run_batch(index, batch))
                .collect()
        });

        let mut report = PipelineReport::default();
        for outcome in outcomes {
            report.absorb(outcome);
        }
        info!(
            batches = report.batches,
            records_in = report.records_in,
            records_written = report.records_written,
            failures = report.failures.len(),
            write_failures = report.write_failures.len(),
            "pipeline finished"
        );
        report
    }

    fn run_batch(&self, index: usize, records: Vec<BaseRecord>) -> BatchOutcome {
        let records_in = records.len();
        let mut batch = RecordBatch::default();
        for record in records {
            match record {
                spg @ BaseRecord::Spg(_) => batch.records.push(spg),
                builder => {
                    for mapper in &self.mappers {
                        let mapped = mapper.process(RecordBatch::new(vec![builder.clone()]));
                        batch.records.extend(mapped.records);
                        batch.failures.extend(mapped.failures);
                    }
                }
            }
        }
        if let Some(reasoner) = &self.reasoner {
            batch = reasoner.process(batch);
        }

        let spg_records: Vec<_> = batch
            .records
            .into_iter()
            .filter_map(|record| match record {
                BaseRecord::Spg(spg) => Some(spg),
                BaseRecord::Builder(_) => None,
            })
            .collect();
        let pending = spg_records.len();
        let (records_written, write_failure) = match self.sink.write(spg_records) {
            Ok(written) => (written, None),
            Err(e) => {
                warn!(batch = index, records = pending, error = %e, "batch write failed");
                let failure = BatchWriteFailure {
                    batch: index,
                    records: pending,
                    message: e.to_string(),
                };
                (0, Some(failure))
            }
        };
        debug!(batch = index, records_in, records_written, failures = batch.failures.len(), "batch done");
        BatchOutcome {
            records_in,
            records_written,
            failures: batch.failures,
            write_failure,
        }
    }

    pub fn close(&self) -> Result<()> {
        for mapper in &self.mappers {
            mapper.close()?;
        }
        if let Some(reasoner) = &self.reasoner {
            reasoner.close()?;
        }
        self.sink.close()
    }
}
