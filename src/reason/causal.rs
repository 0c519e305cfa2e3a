//! Causal (logical-causation) reasoning over an accumulating record set.

use super::overlay::OverlayGraphState;
use super::{GraphState, InductiveConceptReasoner, ReasonerTask, RuleEvaluator};
use crate::convert::to_spg_records;
use crate::error::Result;
use crate::model::{AdvancedRecord, SpgRecord};
use crate::schema::{Catalog, LogicalCausationRule, BELONG_TO};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct CausalConceptReasoner {
    evaluator: Arc<dyn RuleEvaluator>,
    graph_state: Arc<dyn GraphState>,
    catalog: Arc<dyn Catalog>,
    inductive: InductiveConceptReasoner,
}

fn belong_to_value(record: &AdvancedRecord) -> Option<String> {
    let property = record.property(BELONG_TO)?;
    property
        .value
        .std_value()
        .or_else(|| Some(property.value.raw.trim().to_string()))
        .filter(|v| !v.is_empty())
}

/// Identity of a record inside the working set.
fn record_key(record: &SpgRecord) -> (String, String) {
    (record.type_name(), record.id())
}

impl CausalConceptReasoner {
    pub fn new(
        evaluator: Arc<dyn RuleEvaluator>,
        graph_state: Arc<dyn GraphState>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        let inductive = InductiveConceptReasoner::new(
            Arc::clone(&evaluator),
            Arc::clone(&graph_state),
            Arc::clone(&catalog),
        );
        Self {
            evaluator,
            graph_state,
            catalog,
            inductive,
        }
    }

    /// Apply `rules` in order. Each rule starts from every advanced record of
    /// the working set that satisfies its subject concept, and what it derives
    /// joins the working set for the next rule.
    pub fn reasoning(
        &self,
        records: Vec<SpgRecord>,
        rules: &[LogicalCausationRule],
    ) -> Result<Vec<SpgRecord>> {
        let mut working = records;
        for rule in rules {
            let start_ids: Vec<(String, String)> = working
                .iter()
                .filter_map(SpgRecord::as_advanced)
                .filter(|record| match &rule.subject {
                    Some(concept) => belong_to_value(record).as_deref() == Some(concept.as_str()),
                    None => true,
                })
                .map(|record| (record.id.clone(), record.type_name().to_string()))
                .collect();
            if start_ids.is_empty() {
                continue;
            }

            let view = OverlayGraphState::new(Arc::clone(&self.graph_state), &working);
            let task = ReasonerTask {
                dsl: rule.rule.content.clone(),
                start_ids,
                graph_state: Arc::new(view),
                catalog: Arc::clone(&self.catalog),
            };
            let result = self.evaluator.run(&task)?;
            let derived = to_spg_records(&result, self.catalog.as_ref())?;
            debug!(rule = %rule.rule.code, derived = derived.len(), "causal rule applied");

            for mut record in derived {
                if let SpgRecord::Advanced(advanced) = &mut record {
                    self.classify(advanced)?;
                }
                let key = record_key(&record);
                match working.iter_mut().find(|existing| record_key(existing) == key) {
                    Some(existing) => *existing = record,
                    None => working.push(record),
                }
            }
        }
        Ok(working)
    }

    /// Taxonomy reasoning for a derived record whose type belongs to a concept.
    fn classify(&self, record: &mut AdvancedRecord) -> Result<()> {
        let Some(belong_to) = record.spg_type.belong_to_property() else {
            return Ok(());
        };
        if !belong_to.object_type.is_concept() {
            return Ok(());
        }
        let Some(concepts) = self.catalog.get_concept_list(&belong_to.object_type.identifier) else {
            return Ok(());
        };
        self.inductive.reasoning(record, &concepts.dynamic_taxonomy)
    }
}
