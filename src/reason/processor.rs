//! Reasoning stage: concept records go through taxonomy rules, then causation
//! rules when enabled, and are re-linked before the sink.

use super::{CausalConceptReasoner, InductiveConceptReasoner};
use crate::context::BuilderContext;
use crate::error::{BuilderError, Result};
use crate::mapping::{not_initialized, Processor};
use crate::model::{AdvancedRecord, BaseRecord, SpgRecord};
use crate::schema::{Catalog, ConceptList};
use crate::strategy::RecordLinking;
use std::sync::Arc;
use tracing::debug;

struct ReasonState {
    catalog: Arc<dyn Catalog>,
    inductive: InductiveConceptReasoner,
    causal: CausalConceptReasoner,
    enable_lead_to: bool,
    linking: RecordLinking,
}

/// Concept reasoning stage: taxonomy rules, then causation rules, then a
/// re-linking pass over everything the record expanded into.
pub struct ReasonProcessor {
    state: Option<ReasonState>,
}

impl Default for ReasonProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasonProcessor {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl ReasonState {
    /// Concept list governing the record, if it takes part in reasoning.
    fn concept_list(&self, record: &AdvancedRecord) -> Option<Arc<ConceptList>> {
        let belong_to = record.spg_type.belong_to_property()?;
        if !belong_to.object_type.is_concept() {
            return None;
        }
        self.catalog.get_concept_list(&belong_to.object_type.identifier)
    }

    fn reason(&self, mut record: AdvancedRecord, concepts: &ConceptList) -> Result<Vec<SpgRecord>> {
        self.inductive.reasoning(&mut record, &concepts.dynamic_taxonomy)?;

        let mut records = vec![SpgRecord::Advanced(record)];
        if self.enable_lead_to && !concepts.logical_causation.is_empty() {
            records = self.causal.reasoning(records, &concepts.logical_causation)?;
        }
        for record in &mut records {
            self.linking.linking(record)?;
        }
        Ok(records)
    }
}

impl Processor for ReasonProcessor {
    fn name(&self) -> &str {
        "concept-reasoner"
    }

    fn init(&mut self, context: &BuilderContext) -> Result<()> {
        let evaluator = context.rule_evaluator().cloned().ok_or_else(|| {
            BuilderError::config("reasoning is enabled but no rule evaluator is registered")
        })?;
        let graph_state = context.graph_state()?;
        let catalog = Arc::clone(context.catalog());
        self.state = Some(ReasonState {
            inductive: InductiveConceptReasoner::new(
                Arc::clone(&evaluator),
                Arc::clone(&graph_state),
                Arc::clone(&catalog),
            ),
            causal: CausalConceptReasoner::new(evaluator, graph_state, Arc::clone(&catalog)),
            catalog,
            enable_lead_to: context.config().enable_lead_to,
            linking: RecordLinking::default(),
        });
        debug!(enable_lead_to = context.config().enable_lead_to, "concept reasoner initialized");
        Ok(())
    }

    fn process_record(&self, record: BaseRecord) -> Result<Vec<BaseRecord>> {
        let state = self.state.as_ref().ok_or_else(|| not_initialized(self.name()))?;
        let advanced = match record {
            BaseRecord::Spg(SpgRecord::Advanced(advanced)) => advanced,
            other => return Ok(vec![other]),
        };
        let Some(concepts) = state.concept_list(&advanced) else {
            return Ok(vec![BaseRecord::Spg(SpgRecord::Advanced(advanced))]);
        };
        Ok(state
            .reason(advanced, &concepts)?
            .into_iter()
            .map(BaseRecord::Spg)
            .collect())
    }
}
