//! Shared fixtures for unit and integration tests: the demo schema, record
//! builders and a scripted rule evaluator.

use crate::context::BuilderContext;
use crate::convert::{to_advanced_record, ID};
use crate::error::Result;
use crate::model::{AdvancedRecord, RecordAlterOperation, SpgRecord, SpgRecordManipulateCmd};
use crate::reason::{ReasonerResult, ReasonerTask, RuleEvaluator};
use crate::schema::{Catalog, InMemoryCatalog, ProjectSchema};
use hashbrown::HashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

pub const DEMO_SCHEMA: &str = include_str!("../tests/fixtures/demo_schema.json");

pub fn demo_catalog() -> Arc<InMemoryCatalog> {
    let schema = ProjectSchema::from_json(DEMO_SCHEMA).expect("demo schema parses");
    Arc::new(InMemoryCatalog::from_schema(schema).expect("demo schema is consistent"))
}

/// A `Demo.Person` record with the given raw property values.
pub fn person_record(id: &str, props: &[(&str, &str)]) -> AdvancedRecord {
    typed_record("Demo.Person", id, props)
}

pub fn typed_record(spg_type: &str, id: &str, props: &[(&str, &str)]) -> AdvancedRecord {
    let spg_type = demo_catalog()
        .get_spg_type(&spg_type.into())
        .expect("demo type exists");
    let mut values = IndexMap::new();
    values.insert(ID.to_string(), id.to_string());
    for (name, value) in props {
        values.insert(name.to_string(), value.to_string());
    }
    to_advanced_record(spg_type, &values).expect("record converts")
}

/// Index `(id, name)` pairs of `spg_type` in the context's search engine.
pub fn seed_search(context: &BuilderContext, spg_type: &str, entries: &[(&str, &str)]) {
    let records: Vec<SpgRecord> = entries
        .iter()
        .map(|(id, name)| SpgRecord::Advanced(typed_record(spg_type, id, &[("name", name)])))
        .collect();
    context
        .search_engine_client()
        .expect("search engine resolves")
        .manipulate_record(&SpgRecordManipulateCmd::new(RecordAlterOperation::Upsert, &records))
        .expect("search engine accepts records");
}

type Rule = Box<dyn Fn(&ReasonerTask) -> ReasonerResult + Send + Sync>;

/// Rule evaluator answering each DSL text with a scripted closure and
/// recording every call in order.
#[derive(Default)]
pub struct ScriptedEvaluator {
    rules: HashMap<String, Rule>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule<F>(mut self, dsl: &str, rule: F) -> Self
    where
        F: Fn(&ReasonerTask) -> ReasonerResult + Send + Sync + 'static,
    {
        self.rules.insert(dsl.to_string(), Box::new(rule));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().clone()
    }

    pub fn dsl_calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(dsl, _)| dsl.clone()).collect()
    }
}

impl RuleEvaluator for ScriptedEvaluator {
    fn run(&self, task: &ReasonerTask) -> Result<ReasonerResult> {
        self.calls
            .lock()
            .push((task.dsl.clone(), task.start_ids.clone()));
        Ok(self
            .rules
            .get(&task.dsl)
            .map(|rule| rule(task))
            .unwrap_or_default())
    }
}
