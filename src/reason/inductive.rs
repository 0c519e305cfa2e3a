//! Taxonomy (dynamic-taxonomy) reasoning: derive the `belongTo` concept of a record.

use super::overlay::OverlayGraphState;
use super::{GraphState, ReasonerTask, RuleEvaluator};
use crate::error::{BuilderError, Result};
use crate::model::{AdvancedRecord, PropertyRecord, SpgRecord};
use crate::schema::{Catalog, DynamicTaxonomyRule};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct InductiveConceptReasoner {
    evaluator: Arc<dyn RuleEvaluator>,
    graph_state: Arc<dyn GraphState>,
    catalog: Arc<dyn Catalog>,
}

impl InductiveConceptReasoner {
    pub fn new(
        evaluator: Arc<dyn RuleEvaluator>,
        graph_state: Arc<dyn GraphState>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            evaluator,
            graph_state,
            catalog,
        }
    }

    /// Run `rules` in order from the record. The first edge a rule produces
    /// sets `belongTo` to that edge's target, and the next rule observes it.
    pub fn reasoning(&self, record: &mut AdvancedRecord, rules: &[DynamicTaxonomyRule]) -> Result<()> {
        for rule in rules {
            let view = OverlayGraphState::new(
                Arc::clone(&self.graph_state),
                &[SpgRecord::Advanced(record.clone())],
            );
            let task = ReasonerTask {
                dsl: rule.rule.content.clone(),
                start_ids: vec![(record.id.clone(), record.type_name().to_string())],
                graph_state: Arc::new(view),
                catalog: Arc::clone(&self.catalog),
            };
            let result = self.evaluator.run(&task)?;
            if let Some(edge) = result.edges.first() {
                debug!(record = %record.id, concept = %edge.dst_id, rule = %rule.rule.code, "taxonomy matched");
                set_belong_to(record, &edge.dst_id)?;
            }
        }
        Ok(())
    }
}

fn set_belong_to(record: &mut AdvancedRecord, concept_id: &str) -> Result<()> {
    let property = record.spg_type.belong_to_property().cloned().ok_or_else(|| {
        BuilderError::config(format!(
            "type {} declares no belongTo property",
            record.spg_type.identifier
        ))
    })?;
    let mut belong_to = PropertyRecord::new(property, concept_id);
    belong_to.set_ids(&[concept_id.to_string()]);
    record.merge_property_value(belong_to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason::{Edge, ReasonerResult};
    use crate::schema::BELONG_TO;
    use crate::store::MemoryGraphStore;
    use crate::test_support::{demo_catalog, person_record, typed_record, ScriptedEvaluator};

    fn concept_edge(task: &ReasonerTask, concept: &str) -> ReasonerResult {
        let (id, spg_type) = &task.start_ids[0];
        ReasonerResult {
            vertices: vec![],
            edges: vec![Edge::new(
                "Demo.Person_belongTo_Demo.PersonTag",
                (spg_type.as_str(), id.as_str()),
                ("Demo.PersonTag", concept),
            )],
        }
    }

    fn reasoner(evaluator: Arc<ScriptedEvaluator>) -> InductiveConceptReasoner {
        InductiveConceptReasoner::new(evaluator, Arc::new(MemoryGraphStore::new()), demo_catalog())
    }

    #[test]
    fn test_rules_chain_in_order() {
        // rule B only fires once rule A has tagged the record
        let evaluator = Arc::new(
            ScriptedEvaluator::new()
                .with_rule("rule A", |task| concept_edge(task, "Vip"))
                .with_rule("rule B", |task| {
                    let (id, spg_type) = &task.start_ids[0];
                    let vertex = task.graph_state.get_vertex(spg_type, id);
                    let tagged = vertex
                        .and_then(|v| v.props.get(BELONG_TO).cloned())
                        .map_or(false, |v| v == "Vip");
                    if tagged {
                        concept_edge(task, "VipActive")
                    } else {
                        ReasonerResult::default()
                    }
                }),
        );
        let concepts = demo_catalog()
            .get_concept_list(&"Demo.PersonTag".into())
            .unwrap();
        let mut record = person_record("p1", &[("name", "Alice")]);
        reasoner(Arc::clone(&evaluator))
            .reasoning(&mut record, &concepts.dynamic_taxonomy)
            .unwrap();

        assert_eq!(evaluator.dsl_calls(), vec!["rule A", "rule B"]);
        let belong_to = record.property(BELONG_TO).unwrap();
        assert_eq!(belong_to.value.single_id.as_deref(), Some("VipActive"));
        let (_, start_ids) = &evaluator.calls()[0];
        assert_eq!(start_ids, &vec![("p1".to_string(), "Demo.Person".to_string())]);
    }

    #[test]
    fn test_no_edge_leaves_record() {
        let evaluator = Arc::new(ScriptedEvaluator::new());
        let concepts = demo_catalog()
            .get_concept_list(&"Demo.PersonTag".into())
            .unwrap();
        let mut record = person_record("p1", &[("name", "Alice")]);
        let before = record.clone();
        reasoner(evaluator)
            .reasoning(&mut record, &concepts.dynamic_taxonomy)
            .unwrap();
        assert_eq!(record, before);
    }

    #[test]
    fn test_missing_belong_to_is_config_error() {
        let evaluator =
            Arc::new(ScriptedEvaluator::new().with_rule("rule A", |task| concept_edge(task, "Vip")));
        let concepts = demo_catalog()
            .get_concept_list(&"Demo.PersonTag".into())
            .unwrap();
        let mut city = typed_record("Demo.City", "c1", &[("name", "Beijing")]);
        let err = reasoner(evaluator)
            .reasoning(&mut city, &concepts.dynamic_taxonomy)
            .unwrap_err();
        assert!(matches!(err, BuilderError::Config(_)));
        assert!(err.is_fatal());
    }
}
